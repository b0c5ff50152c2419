//! Network classifier (C11, spec.md §4.11): identifies data-transfer cloud
//! rows and classifies their direction from `usage_type`/`operation`
//! substrings.
//!
//! **Open Question Q3 (restated in DESIGN.md):** a NULL-direction network row
//! is kept as a single `Network unattributed` row rather than distributed
//! across the node's observed namespaces, matching the documented source
//! behaviour in spec.md's own statement of the question.

use ocp_model::CloudBillingLineItem;

pub const NETWORK_UNATTRIBUTED_NAMESPACE: &str = "Network unattributed";

const DATA_TRANSFER_FAMILY: &str = "Data Transfer";
const EC2_PRODUCT_CODE: &str = "AmazonEC2";

/// A cloud row is a network row when it belongs to the `Data Transfer`
/// product family and was billed under `AmazonEC2`.
pub fn is_network_row(row: &CloudBillingLineItem) -> bool {
    row.product_productfamily.as_deref() == Some(DATA_TRANSFER_FAMILY)
        && row.lineitem_productcode == EC2_PRODUCT_CODE
}

/// `IN`/`OUT`/`None`, from lower-cased `usage_type`/`operation` substrings.
pub fn classify_direction(usage_type: &str, operation: &str) -> Option<&'static str> {
    let usage_type = usage_type.to_lowercase();
    let operation = operation.to_lowercase();

    let is_in = usage_type.contains("in-bytes")
        || (usage_type.contains("regional-bytes") && operation.contains("-in"));
    if is_in {
        return Some("IN");
    }

    let is_out = usage_type.contains("out-bytes")
        || (usage_type.contains("regional-bytes") && operation.contains("-out"));
    if is_out {
        return Some("OUT");
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;
    use rust_decimal::Decimal;
    use uuid::Uuid;

    fn sample_row(usage_type: &str, operation: &str) -> CloudBillingLineItem {
        CloudBillingLineItem {
            usage_start: NaiveDateTime::UNIX_EPOCH,
            source: Uuid::nil(),
            lineitem_resourceid: "i-0abc123".into(),
            lineitem_usageaccountid: "123456".into(),
            lineitem_productcode: EC2_PRODUCT_CODE.into(),
            product_productfamily: Some(DATA_TRANSFER_FAMILY.into()),
            product_instancetype: None,
            product_region: None,
            lineitem_availabilityzone: None,
            lineitem_usagetype: usage_type.into(),
            lineitem_operation: operation.into(),
            lineitem_usageamount: Decimal::ZERO,
            lineitem_unblendedcost: Decimal::ZERO,
            lineitem_unblendedrate: Decimal::ZERO,
            lineitem_blendedcost: Decimal::ZERO,
            savingsplan_savingsplaneffectivecost: Decimal::ZERO,
            calculated_amortized_cost: Decimal::ZERO,
            lineitem_currencycode: "USD".into(),
            pricing_unit: None,
            resourcetags: None,
            costcategory: None,
            bill_billingentity: None,
            lineitem_lineitemtype: "Usage".into(),
        }
    }

    #[test]
    fn data_transfer_ec2_row_is_a_network_row() {
        let row = sample_row("USW2-DataTransfer-Out-Bytes", "PutObject");
        assert!(is_network_row(&row));
    }

    #[test]
    fn non_ec2_product_code_is_not_a_network_row() {
        let mut row = sample_row("USW2-DataTransfer-Out-Bytes", "PutObject");
        row.lineitem_productcode = "AmazonS3".into();
        assert!(!is_network_row(&row));
    }

    #[test]
    fn out_bytes_usage_type_classifies_as_out() {
        // S6 from spec.md: `usage_type = 'USW2-DataTransfer-Out-Bytes'` -> OUT.
        assert_eq!(classify_direction("USW2-DataTransfer-Out-Bytes", ""), Some("OUT"));
    }

    #[test]
    fn in_bytes_usage_type_classifies_as_in() {
        assert_eq!(classify_direction("USW2-DataTransfer-In-Bytes", ""), Some("IN"));
    }

    #[test]
    fn regional_bytes_defers_to_operation_suffix() {
        assert_eq!(classify_direction("USW2-Regional-Bytes", "Get-In"), Some("IN"));
        assert_eq!(classify_direction("USW2-Regional-Bytes", "Put-Out"), Some("OUT"));
    }

    #[test]
    fn unrelated_usage_type_classifies_as_none() {
        assert_eq!(classify_direction("USW2-BoxUsage", "RunInstances"), None);
    }
}
