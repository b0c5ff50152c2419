//! CSV field encoding for `COPY ... WITH (FORMAT csv)`.
//!
//! Postgres's CSV dialect quotes a field when it contains the delimiter, a
//! quote character, or a newline, doubling any embedded quote. `NULL` is the
//! empty unquoted field. This is a thin builder so every row type in
//! `ocp-container`/`ocp-aggregates` can encode itself without duplicating the
//! quoting rule.

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use uuid::Uuid;

/// Accumulates one CSV line, field by field, in column order.
#[derive(Debug, Default)]
pub struct CsvRow {
    fields: Vec<String>,
}

impl CsvRow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_raw(&mut self, field: impl Into<String>) -> &mut Self {
        self.fields.push(quote(&field.into()));
        self
    }

    pub fn push_null(&mut self) -> &mut Self {
        self.fields.push(String::new());
        self
    }

    pub fn push_opt(&mut self, field: Option<impl Into<String>>) -> &mut Self {
        match field {
            Some(f) => self.push_raw(f),
            None => self.push_null(),
        }
    }

    pub fn push_i64(&mut self, value: i64) -> &mut Self {
        self.fields.push(value.to_string());
        self
    }

    pub fn push_opt_i64(&mut self, value: Option<i64>) -> &mut Self {
        match value {
            Some(v) => self.push_i64(v),
            None => self.push_null(),
        }
    }

    pub fn push_i32(&mut self, value: i32) -> &mut Self {
        self.fields.push(value.to_string());
        self
    }

    pub fn push_opt_i32(&mut self, value: Option<i32>) -> &mut Self {
        match value {
            Some(v) => self.push_i32(v),
            None => self.push_null(),
        }
    }

    pub fn push_decimal(&mut self, value: Decimal) -> &mut Self {
        self.fields.push(value.normalize().to_string());
        self
    }

    pub fn push_opt_decimal(&mut self, value: Option<Decimal>) -> &mut Self {
        match value {
            Some(v) => self.push_decimal(v),
            None => self.push_null(),
        }
    }

    pub fn push_f64(&mut self, value: f64) -> &mut Self {
        self.fields.push(value.to_string());
        self
    }

    pub fn push_opt_f64(&mut self, value: Option<f64>) -> &mut Self {
        match value {
            Some(v) => self.push_f64(v),
            None => self.push_null(),
        }
    }

    pub fn push_bool(&mut self, value: bool) -> &mut Self {
        self.fields.push(value.to_string());
        self
    }

    pub fn push_timestamp(&mut self, value: NaiveDateTime) -> &mut Self {
        self.fields.push(value.format("%Y-%m-%d %H:%M:%S%.f").to_string());
        self
    }

    pub fn push_uuid(&mut self, value: Uuid) -> &mut Self {
        self.fields.push(value.to_string());
        self
    }

    pub fn push_opt_uuid(&mut self, value: Option<Uuid>) -> &mut Self {
        match value {
            Some(v) => self.push_uuid(v),
            None => self.push_null(),
        }
    }

    pub fn finish(self) -> String {
        self.fields.join(",")
    }
}

fn quote(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') || value.contains('\r') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn plain_fields_are_unquoted() {
        let mut row = CsvRow::new();
        row.push_raw("namespace-a").push_i64(42).push_decimal(dec!(1.50));
        assert_eq!(row.finish(), "namespace-a,42,1.50");
    }

    #[test]
    fn fields_with_commas_or_quotes_are_quoted_and_escaped() {
        let mut row = CsvRow::new();
        row.push_raw(r#"{"team":"a,b"}"#);
        assert_eq!(row.finish(), r#""{""team"":""a,b""}""#);
    }

    #[test]
    fn null_values_are_empty_unquoted_fields() {
        let mut row = CsvRow::new();
        row.push_null();
        row.push_opt::<String>(None);
        row.push_opt_decimal(None);
        assert_eq!(row.finish(), ",,");
    }

    #[test]
    fn f64_and_bool_fields_are_plain() {
        let mut row = CsvRow::new();
        row.push_f64(4.5).push_opt_f64(None).push_bool(true);
        assert_eq!(row.finish(), "4.5,,true");
    }
}
