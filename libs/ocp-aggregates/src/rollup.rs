//! Aggregation materialiser (C13, spec.md §4.13): from the attributed
//! per-project `ContainerOnCloudRow`s, produce the eight roll-up relations
//! by `GROUP BY` with filters. Every roll-up shares the same shape of
//! reduction — `sum` over the cost/markup columns, `max` over
//! currency/metadata, a fresh synthetic row id — so one generic grouping
//! helper (`group_sum`) backs all eight, the same way the container
//! aggregators (`ocp_container::pods`/`storage`) share one
//! accumulate-then-emit shape per group.

use std::collections::HashMap;
use std::hash::Hash;

use chrono::NaiveDate;
use ocp_model::ContainerOnCloudRow;
use rust_decimal::Decimal;
use uuid::Uuid;

/// Cloud product codes rolled into `database_summary` (spec.md §4.13).
pub const DATABASE_PRODUCT_CODES: &[&str] = &[
    "AmazonRDS",
    "AmazonDynamoDB",
    "AmazonElastiCache",
    "AmazonNeptune",
    "AmazonRedshift",
    "AmazonDocumentDB",
];

/// Cloud product codes rolled into `network_summary` (spec.md §4.13).
pub const NETWORK_PRODUCT_CODES: &[&str] = &[
    "AmazonVPC",
    "AmazonCloudFront",
    "AmazonRoute53",
    "AmazonAPIGateway",
];

const STORAGE_PRICING_UNIT: &str = "GB-Mo";

#[derive(Default, Clone)]
struct CostAccumulator {
    unblended_cost: Decimal,
    blended_cost: Decimal,
    savingsplan_effective_cost: Decimal,
    calculated_amortized_cost: Decimal,
    markup_unblended_cost: Decimal,
    markup_blended_cost: Decimal,
    markup_savingsplan_effective_cost: Decimal,
    markup_calculated_amortized_cost: Decimal,
    currency_code: String,
}

impl CostAccumulator {
    fn add(&mut self, row: &ContainerOnCloudRow) {
        self.unblended_cost += row.unblended_cost;
        self.blended_cost += row.blended_cost;
        self.savingsplan_effective_cost += row.savingsplan_effective_cost;
        self.calculated_amortized_cost += row.calculated_amortized_cost;
        self.markup_unblended_cost += row.markup_unblended_cost;
        self.markup_blended_cost += row.markup_blended_cost;
        self.markup_savingsplan_effective_cost += row.markup_savingsplan_effective_cost;
        self.markup_calculated_amortized_cost += row.markup_calculated_amortized_cost;
        if row.currency_code > self.currency_code {
            self.currency_code = row.currency_code.clone();
        }
    }
}

/// `GROUP BY` over `rows` filtered by `keep`, keyed by `key_fn`. Generic
/// over the key shape so each roll-up below only has to say what its group
/// key and filter are — the sum/max reduction itself is written once.
fn group_sum<K, KeyFn, Keep>(rows: &[ContainerOnCloudRow], keep: Keep, key_fn: KeyFn) -> Vec<(K, CostAccumulator)>
where
    K: Eq + Hash + Clone,
    KeyFn: Fn(&ContainerOnCloudRow) -> K,
    Keep: Fn(&ContainerOnCloudRow) -> bool,
{
    let mut groups: HashMap<K, CostAccumulator> = HashMap::new();
    for row in rows.iter().filter(|r| keep(r)) {
        let key = key_fn(row);
        let acc = groups.entry(key).or_default();
        acc.add(row);
    }
    groups.into_iter().collect()
}

fn always_keep(_: &ContainerOnCloudRow) -> bool {
    true
}

#[derive(Debug, Clone)]
pub struct CostSummaryRow {
    pub id: Uuid,
    pub usage_start: NaiveDate,
    pub unblended_cost: Decimal,
    pub blended_cost: Decimal,
    pub savingsplan_effective_cost: Decimal,
    pub calculated_amortized_cost: Decimal,
    pub markup_unblended_cost: Decimal,
    pub markup_blended_cost: Decimal,
    pub markup_savingsplan_effective_cost: Decimal,
    pub markup_calculated_amortized_cost: Decimal,
    pub currency_code: String,
}

/// `cost_summary`: `GROUP BY usage_start` only.
pub fn materialise_cost_summary(rows: &[ContainerOnCloudRow]) -> Vec<CostSummaryRow> {
    group_sum(rows, always_keep, |r| r.usage_start)
        .into_iter()
        .map(|(usage_start, acc)| CostSummaryRow {
            id: Uuid::new_v4(),
            usage_start,
            unblended_cost: acc.unblended_cost,
            blended_cost: acc.blended_cost,
            savingsplan_effective_cost: acc.savingsplan_effective_cost,
            calculated_amortized_cost: acc.calculated_amortized_cost,
            markup_unblended_cost: acc.markup_unblended_cost,
            markup_blended_cost: acc.markup_blended_cost,
            markup_savingsplan_effective_cost: acc.markup_savingsplan_effective_cost,
            markup_calculated_amortized_cost: acc.markup_calculated_amortized_cost,
            currency_code: acc.currency_code,
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct ByAccountRow {
    pub id: Uuid,
    pub usage_start: NaiveDate,
    pub usage_account_id: String,
    pub unblended_cost: Decimal,
    pub blended_cost: Decimal,
    pub savingsplan_effective_cost: Decimal,
    pub calculated_amortized_cost: Decimal,
    pub markup_unblended_cost: Decimal,
    pub markup_blended_cost: Decimal,
    pub markup_savingsplan_effective_cost: Decimal,
    pub markup_calculated_amortized_cost: Decimal,
    pub currency_code: String,
}

/// `by_account`: `GROUP BY usage_start, usage_account_id`.
pub fn materialise_by_account(rows: &[ContainerOnCloudRow]) -> Vec<ByAccountRow> {
    group_sum(rows, always_keep, |r| (r.usage_start, r.usage_account_id.clone()))
        .into_iter()
        .map(|((usage_start, usage_account_id), acc)| ByAccountRow {
            id: Uuid::new_v4(),
            usage_start,
            usage_account_id,
            unblended_cost: acc.unblended_cost,
            blended_cost: acc.blended_cost,
            savingsplan_effective_cost: acc.savingsplan_effective_cost,
            calculated_amortized_cost: acc.calculated_amortized_cost,
            markup_unblended_cost: acc.markup_unblended_cost,
            markup_blended_cost: acc.markup_blended_cost,
            markup_savingsplan_effective_cost: acc.markup_savingsplan_effective_cost,
            markup_calculated_amortized_cost: acc.markup_calculated_amortized_cost,
            currency_code: acc.currency_code,
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct ByServiceRow {
    pub id: Uuid,
    pub usage_start: NaiveDate,
    pub usage_account_id: String,
    pub product_code: String,
    pub product_family: Option<String>,
    pub unblended_cost: Decimal,
    pub blended_cost: Decimal,
    pub savingsplan_effective_cost: Decimal,
    pub calculated_amortized_cost: Decimal,
    pub markup_unblended_cost: Decimal,
    pub markup_blended_cost: Decimal,
    pub markup_savingsplan_effective_cost: Decimal,
    pub markup_calculated_amortized_cost: Decimal,
    pub currency_code: String,
}

/// `by_service`: `GROUP BY usage_start, usage_account_id, product_code,
/// product_family`.
pub fn materialise_by_service(rows: &[ContainerOnCloudRow]) -> Vec<ByServiceRow> {
    group_sum(rows, always_keep, |r| {
        (r.usage_start, r.usage_account_id.clone(), r.product_code.clone(), r.product_family.clone())
    })
    .into_iter()
    .map(|((usage_start, usage_account_id, product_code, product_family), acc)| ByServiceRow {
        id: Uuid::new_v4(),
        usage_start,
        usage_account_id,
        product_code,
        product_family,
        unblended_cost: acc.unblended_cost,
        blended_cost: acc.blended_cost,
        savingsplan_effective_cost: acc.savingsplan_effective_cost,
        calculated_amortized_cost: acc.calculated_amortized_cost,
        markup_unblended_cost: acc.markup_unblended_cost,
        markup_blended_cost: acc.markup_blended_cost,
        markup_savingsplan_effective_cost: acc.markup_savingsplan_effective_cost,
        markup_calculated_amortized_cost: acc.markup_calculated_amortized_cost,
        currency_code: acc.currency_code,
    })
    .collect()
}

#[derive(Debug, Clone)]
pub struct ByRegionRow {
    pub id: Uuid,
    pub usage_start: NaiveDate,
    pub usage_account_id: String,
    pub region: Option<String>,
    pub availability_zone: Option<String>,
    pub unblended_cost: Decimal,
    pub blended_cost: Decimal,
    pub savingsplan_effective_cost: Decimal,
    pub calculated_amortized_cost: Decimal,
    pub markup_unblended_cost: Decimal,
    pub markup_blended_cost: Decimal,
    pub markup_savingsplan_effective_cost: Decimal,
    pub markup_calculated_amortized_cost: Decimal,
    pub currency_code: String,
}

/// `by_region`: `GROUP BY usage_start, usage_account_id, region,
/// availability_zone`.
pub fn materialise_by_region(rows: &[ContainerOnCloudRow]) -> Vec<ByRegionRow> {
    group_sum(rows, always_keep, |r| {
        (r.usage_start, r.usage_account_id.clone(), r.region.clone(), r.availability_zone.clone())
    })
    .into_iter()
    .map(|((usage_start, usage_account_id, region, availability_zone), acc)| ByRegionRow {
        id: Uuid::new_v4(),
        usage_start,
        usage_account_id,
        region,
        availability_zone,
        unblended_cost: acc.unblended_cost,
        blended_cost: acc.blended_cost,
        savingsplan_effective_cost: acc.savingsplan_effective_cost,
        calculated_amortized_cost: acc.calculated_amortized_cost,
        markup_unblended_cost: acc.markup_unblended_cost,
        markup_blended_cost: acc.markup_blended_cost,
        markup_savingsplan_effective_cost: acc.markup_savingsplan_effective_cost,
        markup_calculated_amortized_cost: acc.markup_calculated_amortized_cost,
        currency_code: acc.currency_code,
    })
    .collect()
}

#[derive(Debug, Clone)]
pub struct ComputeSummaryRow {
    pub id: Uuid,
    pub usage_start: NaiveDate,
    pub usage_account_id: String,
    pub instance_type: String,
    pub resource_id: Option<String>,
    pub unblended_cost: Decimal,
    pub blended_cost: Decimal,
    pub savingsplan_effective_cost: Decimal,
    pub calculated_amortized_cost: Decimal,
    pub markup_unblended_cost: Decimal,
    pub markup_blended_cost: Decimal,
    pub markup_savingsplan_effective_cost: Decimal,
    pub markup_calculated_amortized_cost: Decimal,
    pub currency_code: String,
}

/// `compute_summary`: filter `instance_type IS NOT NULL`; `GROUP BY
/// usage_start, usage_account_id, instance_type, resource_id`.
pub fn materialise_compute_summary(rows: &[ContainerOnCloudRow]) -> Vec<ComputeSummaryRow> {
    group_sum(
        rows,
        |r| r.instance_type.is_some(),
        |r| {
            (
                r.usage_start,
                r.usage_account_id.clone(),
                r.instance_type.clone().unwrap_or_default(),
                r.resource_id.clone(),
            )
        },
    )
    .into_iter()
    .map(|((usage_start, usage_account_id, instance_type, resource_id), acc)| ComputeSummaryRow {
        id: Uuid::new_v4(),
        usage_start,
        usage_account_id,
        instance_type,
        resource_id,
        unblended_cost: acc.unblended_cost,
        blended_cost: acc.blended_cost,
        savingsplan_effective_cost: acc.savingsplan_effective_cost,
        calculated_amortized_cost: acc.calculated_amortized_cost,
        markup_unblended_cost: acc.markup_unblended_cost,
        markup_blended_cost: acc.markup_blended_cost,
        markup_savingsplan_effective_cost: acc.markup_savingsplan_effective_cost,
        markup_calculated_amortized_cost: acc.markup_calculated_amortized_cost,
        currency_code: acc.currency_code,
    })
    .collect()
}

#[derive(Debug, Clone)]
pub struct StorageSummaryRow {
    pub id: Uuid,
    pub usage_start: NaiveDate,
    pub usage_account_id: String,
    pub product_family: String,
    pub unblended_cost: Decimal,
    pub blended_cost: Decimal,
    pub savingsplan_effective_cost: Decimal,
    pub calculated_amortized_cost: Decimal,
    pub markup_unblended_cost: Decimal,
    pub markup_blended_cost: Decimal,
    pub markup_savingsplan_effective_cost: Decimal,
    pub markup_calculated_amortized_cost: Decimal,
    pub currency_code: String,
}

/// `storage_summary`: filter `product_family LIKE '%Storage%' AND
/// pricing_unit = 'GB-Mo'`; `GROUP BY usage_start, usage_account_id,
/// product_family`.
pub fn materialise_storage_summary(rows: &[ContainerOnCloudRow]) -> Vec<StorageSummaryRow> {
    group_sum(
        rows,
        |r| {
            r.product_family.as_deref().is_some_and(|f| f.contains("Storage"))
                && r.pricing_unit.as_deref() == Some(STORAGE_PRICING_UNIT)
        },
        |r| (r.usage_start, r.usage_account_id.clone(), r.product_family.clone().unwrap_or_default()),
    )
    .into_iter()
    .map(|((usage_start, usage_account_id, product_family), acc)| StorageSummaryRow {
        id: Uuid::new_v4(),
        usage_start,
        usage_account_id,
        product_family,
        unblended_cost: acc.unblended_cost,
        blended_cost: acc.blended_cost,
        savingsplan_effective_cost: acc.savingsplan_effective_cost,
        calculated_amortized_cost: acc.calculated_amortized_cost,
        markup_unblended_cost: acc.markup_unblended_cost,
        markup_blended_cost: acc.markup_blended_cost,
        markup_savingsplan_effective_cost: acc.markup_savingsplan_effective_cost,
        markup_calculated_amortized_cost: acc.markup_calculated_amortized_cost,
        currency_code: acc.currency_code,
    })
    .collect()
}

#[derive(Debug, Clone)]
pub struct DatabaseSummaryRow {
    pub id: Uuid,
    pub usage_start: NaiveDate,
    pub usage_account_id: String,
    pub product_code: String,
    pub product_family: Option<String>,
    pub unblended_cost: Decimal,
    pub blended_cost: Decimal,
    pub savingsplan_effective_cost: Decimal,
    pub calculated_amortized_cost: Decimal,
    pub markup_unblended_cost: Decimal,
    pub markup_blended_cost: Decimal,
    pub markup_savingsplan_effective_cost: Decimal,
    pub markup_calculated_amortized_cost: Decimal,
    pub currency_code: String,
}

/// `database_summary`: filter `product_code IN (...)` (spec.md §4.13's
/// database product list); grouped the same way as `by_service` since the
/// spec names only the filter, not a distinct grouping.
pub fn materialise_database_summary(rows: &[ContainerOnCloudRow]) -> Vec<DatabaseSummaryRow> {
    group_sum(
        rows,
        |r| DATABASE_PRODUCT_CODES.contains(&r.product_code.as_str()),
        |r| (r.usage_start, r.usage_account_id.clone(), r.product_code.clone(), r.product_family.clone()),
    )
    .into_iter()
    .map(|((usage_start, usage_account_id, product_code, product_family), acc)| DatabaseSummaryRow {
        id: Uuid::new_v4(),
        usage_start,
        usage_account_id,
        product_code,
        product_family,
        unblended_cost: acc.unblended_cost,
        blended_cost: acc.blended_cost,
        savingsplan_effective_cost: acc.savingsplan_effective_cost,
        calculated_amortized_cost: acc.calculated_amortized_cost,
        markup_unblended_cost: acc.markup_unblended_cost,
        markup_blended_cost: acc.markup_blended_cost,
        markup_savingsplan_effective_cost: acc.markup_savingsplan_effective_cost,
        markup_calculated_amortized_cost: acc.markup_calculated_amortized_cost,
        currency_code: acc.currency_code,
    })
    .collect()
}

#[derive(Debug, Clone)]
pub struct NetworkSummaryRow {
    pub id: Uuid,
    pub usage_start: NaiveDate,
    pub usage_account_id: String,
    pub product_code: String,
    pub product_family: Option<String>,
    pub unblended_cost: Decimal,
    pub blended_cost: Decimal,
    pub savingsplan_effective_cost: Decimal,
    pub calculated_amortized_cost: Decimal,
    pub markup_unblended_cost: Decimal,
    pub markup_blended_cost: Decimal,
    pub markup_savingsplan_effective_cost: Decimal,
    pub markup_calculated_amortized_cost: Decimal,
    pub currency_code: String,
}

/// `network_summary`: filter `product_code IN (...)` (spec.md §4.13's
/// network product list); grouped the same way as `by_service`.
pub fn materialise_network_summary(rows: &[ContainerOnCloudRow]) -> Vec<NetworkSummaryRow> {
    group_sum(
        rows,
        |r| NETWORK_PRODUCT_CODES.contains(&r.product_code.as_str()),
        |r| (r.usage_start, r.usage_account_id.clone(), r.product_code.clone(), r.product_family.clone()),
    )
    .into_iter()
    .map(|((usage_start, usage_account_id, product_code, product_family), acc)| NetworkSummaryRow {
        id: Uuid::new_v4(),
        usage_start,
        usage_account_id,
        product_code,
        product_family,
        unblended_cost: acc.unblended_cost,
        blended_cost: acc.blended_cost,
        savingsplan_effective_cost: acc.savingsplan_effective_cost,
        calculated_amortized_cost: acc.calculated_amortized_cost,
        markup_unblended_cost: acc.markup_unblended_cost,
        markup_blended_cost: acc.markup_blended_cost,
        markup_savingsplan_effective_cost: acc.markup_savingsplan_effective_cost,
        markup_calculated_amortized_cost: acc.markup_calculated_amortized_cost,
        currency_code: acc.currency_code,
    })
    .collect()
}
