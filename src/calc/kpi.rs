//! Per-metric calculators
//!
//! Each calculator reads the rows of its metric's statements from a
//! `ResultSet` and produces the dashboard fields. Calculators never fail:
//! missing, null and malformed cells degrade to zero, and an empty result
//! yields zero counts, `"0.00%"` percentages and empty lists.

use super::coerce::{dec_at, first_dec, first_int, int_at, mean, ratio, text_at};
use super::format::month_label;
use super::metric::{DerivedMetric, MetricResponse};
use crate::broker::{RawRow, TypedValue};
use crate::pipeline::{MetricKind, ResultSet};
use crate::query::ids;

/// Shipment statuses reported by `shipment-status-counts`, in output order
pub const SHIPMENT_STATUSES: [&str; 5] =
    ["Delivered", "Shipped", "Pending", "Cancelled", "Return Received"];

/// Turn the joined results of `kind` into its response
pub fn derive(kind: MetricKind, results: &ResultSet) -> MetricResponse {
    let fields = match kind {
        MetricKind::TotalOrders => vec![DerivedMetric::count(
            "total_orders",
            first_int(results.rows(ids::TOTAL_ORDERS)),
        )],
        MetricKind::ShipmentStatusPercentage => shipment_status_percentage(results),
        MetricKind::FulfillmentRate => fulfillment_rate(results),
        MetricKind::OutOfStock => vec![DerivedMetric::count(
            "out_of_stock_count",
            first_int(results.rows(ids::OUT_OF_STOCK)),
        )],
        MetricKind::TotalSales => vec![DerivedMetric::decimal(
            "total_sales",
            first_dec(results.rows(ids::TOTAL_SALES)),
        )],
        MetricKind::SalesMetrics => sales_metrics(results),
        MetricKind::RevenueTrends => revenue_trends(results),
        MetricKind::ForecastedSales => vec![DerivedMetric::decimal(
            "forecasted_sales",
            mean(results.rows(ids::FORECASTED_SALES).iter().map(|row| dec_at(row, 1))),
        )],
        MetricKind::InventoryTurnover => inventory_turnover(results),
        MetricKind::TopProducts => top_products(results),
        MetricKind::TopCustomers => top_customers(results),
        MetricKind::ShipmentStatusCounts => shipment_status_counts(results),
        MetricKind::ShipmentPerformance => shipment_performance(results),
        MetricKind::WeeklyOrderTrends => weekly_order_trends(results),
        MetricKind::CategoryOrderTrends => category_order_trends(results),
        MetricKind::RecentOrders => recent_orders(results),
    };
    MetricResponse::new(kind, fields)
}

static NULL_CELL: TypedValue = TypedValue::Null;

fn cell(row: &RawRow, index: usize) -> &TypedValue {
    row.get(index).unwrap_or(&NULL_CELL)
}

fn records(rows: &[RawRow], f: impl Fn(&RawRow) -> Vec<DerivedMetric>) -> Vec<Vec<DerivedMetric>> {
    rows.iter().map(f).collect()
}

// ============================================================================
// Scalar KPIs
// ============================================================================

fn shipment_status_percentage(results: &ResultSet) -> Vec<DerivedMetric> {
    let (total, delayed, in_transit) = match results.rows(ids::SHIPMENT_STATUS_PERCENTAGE).first() {
        Some(row) => (int_at(row, 0), int_at(row, 1), int_at(row, 2)),
        None => (0, 0, 0),
    };
    vec![
        DerivedMetric::percentage("delayed_percentage", ratio(delayed as f64 * 100.0, total as f64)),
        DerivedMetric::count("in_transit_orders", in_transit),
    ]
}

fn fulfillment_rate(results: &ResultSet) -> Vec<DerivedMetric> {
    let (fulfilled, total) = match results.rows(ids::FULFILLMENT_RATE).first() {
        Some(row) => (dec_at(row, 0), dec_at(row, 1)),
        None => (0.0, 0.0),
    };
    vec![DerivedMetric::percentage(
        "fulfillment_rate",
        ratio(fulfilled * 100.0, total),
    )]
}

fn sales_metrics(results: &ResultSet) -> Vec<DerivedMetric> {
    vec![
        DerivedMetric::decimal("avg_order_value", first_dec(results.rows(ids::AVG_ORDER_VALUE))),
        DerivedMetric::count("high_spenders", first_int(results.rows(ids::HIGH_SPENDERS))),
        DerivedMetric::count("new_customers", first_int(results.rows(ids::NEW_CUSTOMERS))),
        DerivedMetric::count(
            "returning_customers",
            first_int(results.rows(ids::RETURNING_CUSTOMERS)),
        ),
    ]
}

fn shipment_status_counts(results: &ResultSet) -> Vec<DerivedMetric> {
    let mut counts = [0i64; SHIPMENT_STATUSES.len()];
    for row in results.rows(ids::SHIPMENT_STATUS_COUNTS) {
        let status = text_at(row, 0, "");
        if let Some(slot) = SHIPMENT_STATUSES.iter().position(|s| *s == status.trim()) {
            counts[slot] = int_at(row, 1);
        }
    }

    let return_received = counts[SHIPMENT_STATUSES.len() - 1];
    let refunded = (return_received as f64 / 3.0).round() as i64;

    let mut fields: Vec<DerivedMetric> = SHIPMENT_STATUSES
        .iter()
        .zip(counts)
        .map(|(status, count)| DerivedMetric::count(*status, count))
        .collect();
    fields.push(DerivedMetric::count("Refunded", refunded));
    fields
}

// ============================================================================
// Time series
// ============================================================================

fn revenue_trends(results: &ResultSet) -> Vec<DerivedMetric> {
    vec![DerivedMetric::records(
        "revenue_trends",
        records(results.rows(ids::REVENUE_TRENDS), |row| {
            vec![
                DerivedMetric::month("month", cell(row, 0)),
                DerivedMetric::decimal("monthly_revenue", dec_at(row, 1)),
            ]
        }),
    )]
}

fn inventory_turnover(results: &ResultSet) -> Vec<DerivedMetric> {
    let turnover = records(results.rows(ids::INVENTORY_TURNOVER), |row| {
        vec![
            DerivedMetric::month("month", cell(row, 0)),
            DerivedMetric::decimal("turnover_rate", ratio(dec_at(row, 1), dec_at(row, 2))),
        ]
    });
    let low_stock = records(results.rows(ids::LOW_STOCK), |row| {
        vec![
            DerivedMetric::text("product_name", text_at(row, 0, "Unknown")),
            DerivedMetric::count("stock_quantity", int_at(row, 1)),
            DerivedMetric::date("restock_date", cell(row, 2)),
        ]
    });
    vec![
        DerivedMetric::records("turnover_rates", turnover),
        DerivedMetric::records("low_stock_alerts", low_stock),
    ]
}

fn weekly_order_trends(results: &ResultSet) -> Vec<DerivedMetric> {
    vec![DerivedMetric::records(
        "weekly_order_trends",
        records(results.rows(ids::WEEKLY_ORDER_TRENDS), |row| {
            vec![
                DerivedMetric::date("week_start", cell(row, 0)),
                DerivedMetric::text("category_id", text_at(row, 1, "N/A")),
                DerivedMetric::count("order_count", int_at(row, 2)),
            ]
        }),
    )]
}

/// month -> {category: sales}; a repeated (month, category) keeps the last value
fn category_order_trends(results: &ResultSet) -> Vec<DerivedMetric> {
    let mut groups: Vec<(String, Vec<DerivedMetric>)> = Vec::new();
    for row in results.rows(ids::CATEGORY_ORDER_TRENDS) {
        let month = month_label(cell(row, 0));
        let category = text_at(row, 1, "Unknown");
        let sales = DerivedMetric::decimal(category.clone(), dec_at(row, 2));

        let index = match groups.iter().position(|(m, _)| *m == month) {
            Some(index) => index,
            None => {
                groups.push((month, Vec::new()));
                groups.len() - 1
            }
        };
        let fields = &mut groups[index].1;
        match fields.iter_mut().find(|f| f.name == category) {
            Some(existing) => *existing = sales,
            None => fields.push(sales),
        }
    }
    vec![DerivedMetric::groups("order_trends", groups)]
}

// ============================================================================
// Ranked lists
// ============================================================================

fn top_products(results: &ResultSet) -> Vec<DerivedMetric> {
    vec![DerivedMetric::records(
        "top_products",
        records(results.rows(ids::TOP_PRODUCTS), |row| {
            vec![
                DerivedMetric::text("product_name", text_at(row, 0, "N/A")),
                DerivedMetric::count("quantity_sold", int_at(row, 1)),
                DerivedMetric::percentage("percentage", dec_at(row, 2)),
            ]
        }),
    )]
}

fn top_customers(results: &ResultSet) -> Vec<DerivedMetric> {
    vec![DerivedMetric::records(
        "top_customers",
        records(results.rows(ids::TOP_CUSTOMERS), |row| {
            let customer_id = text_at(row, 0, "N/A");
            vec![
                DerivedMetric::text("customer_name", format!("Customer {}", customer_id)),
                DerivedMetric::text("customer_id", customer_id),
                DerivedMetric::decimal("revenue", dec_at(row, 1)),
            ]
        }),
    )]
}

fn shipment_performance(results: &ResultSet) -> Vec<DerivedMetric> {
    vec![DerivedMetric::records(
        "shipment_performance",
        records(results.rows(ids::SHIPMENT_PERFORMANCE), |row| {
            vec![
                DerivedMetric::text("carrier", text_at(row, 0, "Unknown")),
                DerivedMetric::count("standard", int_at(row, 1)),
                DerivedMetric::count("expedited", int_at(row, 2)),
                DerivedMetric::count("same_day", int_at(row, 3)),
            ]
        }),
    )]
}

fn recent_orders(results: &ResultSet) -> Vec<DerivedMetric> {
    vec![DerivedMetric::records(
        "recent_orders",
        records(results.rows(ids::RECENT_ORDERS), |row| {
            vec![
                DerivedMetric::text("order_id", text_at(row, 0, "N/A")),
                DerivedMetric::text("product_name", text_at(row, 1, "N/A")),
                DerivedMetric::text("category", text_at(row, 2, "N/A")),
                DerivedMetric::decimal("price", dec_at(row, 3)),
                DerivedMetric::text("order_type", text_at(row, 4, "N/A")),
                DerivedMetric::text("shipment_status", text_at(row, 5, "Pending")),
            ]
        }),
    )]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::QueryResult;
    use crate::calc::DerivedValue;

    fn text_row(cells: &[&str]) -> RawRow {
        cells.iter().map(|c| TypedValue::from(*c)).collect()
    }

    fn results(id: &'static str, rows: Vec<RawRow>) -> ResultSet {
        ResultSet::new(vec![QueryResult::new(id, rows)])
    }

    fn empty(kind: MetricKind) -> MetricResponse {
        let ids: Vec<_> = crate::query::QueryBuilder::new()
            .build(
                kind,
                &crate::query::MetricParams::new().with_range(
                    crate::query::DateRange::parse("2024-01-01", "2024-12-31").unwrap(),
                ),
            )
            .unwrap()
            .specs()
            .iter()
            .map(|s| QueryResult::empty(s.id()))
            .collect();
        derive(kind, &ResultSet::new(ids))
    }

    #[test]
    fn test_empty_results_render_zero() {
        for kind in MetricKind::ALL {
            let response = empty(kind);
            for field in &response.fields {
                match (&field.value, field.format) {
                    (DerivedValue::Integer(i), _) => assert_eq!(*i, 0, "{}.{}", kind, field.name),
                    (DerivedValue::Decimal(f), _) => assert_eq!(*f, 0.0, "{}.{}", kind, field.name),
                    (DerivedValue::Text(s), crate::calc::Format::Percentage) => {
                        assert_eq!(s, "0.00%", "{}.{}", kind, field.name)
                    }
                    (DerivedValue::Records(r), _) => assert!(r.is_empty()),
                    (DerivedValue::Groups(g), _) => assert!(g.is_empty()),
                    (DerivedValue::Text(_), _) => {}
                }
            }
        }
    }

    #[test]
    fn test_total_orders() {
        let response = derive(
            MetricKind::TotalOrders,
            &results(ids::TOTAL_ORDERS, vec![text_row(&["120"])]),
        );
        assert_eq!(response.get("total_orders"), Some(&DerivedValue::Integer(120)));
    }

    #[test]
    fn test_malformed_count_is_zero() {
        let response = derive(
            MetricKind::TotalOrders,
            &results(ids::TOTAL_ORDERS, vec![text_row(&["lots"])]),
        );
        assert_eq!(response.get("total_orders"), Some(&DerivedValue::Integer(0)));
    }

    #[test]
    fn test_shipment_status_percentage() {
        let response = derive(
            MetricKind::ShipmentStatusPercentage,
            &results(ids::SHIPMENT_STATUS_PERCENTAGE, vec![text_row(&["3", "1", "2"])]),
        );
        assert_eq!(
            response.get("delayed_percentage"),
            Some(&DerivedValue::Text("33.33%".into()))
        );
        assert_eq!(response.get("in_transit_orders"), Some(&DerivedValue::Integer(2)));
    }

    #[test]
    fn test_fulfillment_rate_zero_denominator() {
        let response = derive(
            MetricKind::FulfillmentRate,
            &results(ids::FULFILLMENT_RATE, vec![vec![TypedValue::Integer(0), TypedValue::Integer(0)]]),
        );
        assert_eq!(
            response.get("fulfillment_rate"),
            Some(&DerivedValue::Text("0.00%".into()))
        );
    }

    #[test]
    fn test_shipment_status_counts_refunded() {
        let response = derive(
            MetricKind::ShipmentStatusCounts,
            &results(
                ids::SHIPMENT_STATUS_COUNTS,
                vec![
                    text_row(&["Delivered", "10"]),
                    text_row(&["Return Received", "8"]),
                    text_row(&["Lost", "99"]),
                ],
            ),
        );
        let names: Vec<_> = response.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(
            names,
            ["Delivered", "Shipped", "Pending", "Cancelled", "Return Received", "Refunded"]
        );
        assert_eq!(response.get("Delivered"), Some(&DerivedValue::Integer(10)));
        assert_eq!(response.get("Shipped"), Some(&DerivedValue::Integer(0)));
        assert_eq!(response.get("Refunded"), Some(&DerivedValue::Integer(3)));
    }

    #[test]
    fn test_forecast_is_mean_of_rows() {
        let response = derive(
            MetricKind::ForecastedSales,
            &results(
                ids::FORECASTED_SALES,
                vec![
                    text_row(&["2024-03-01", "100"]),
                    text_row(&["2024-02-01", "200"]),
                    text_row(&["2024-01-01", "bad"]),
                ],
            ),
        );
        assert_eq!(response.get("forecasted_sales"), Some(&DerivedValue::Decimal(100.0)));
    }

    #[test]
    fn test_turnover_and_low_stock() {
        let set = ResultSet::new(vec![
            QueryResult::new(
                ids::INVENTORY_TURNOVER,
                vec![
                    text_row(&["2024-01-01 00:00:00.0", "50", "20"]),
                    vec![TypedValue::Integer(1_706_745_600_000), TypedValue::from("5"), TypedValue::Null],
                ],
            ),
            QueryResult::new(
                ids::LOW_STOCK,
                vec![vec![TypedValue::Null, TypedValue::from("2"), TypedValue::from("2024-02-10 08:00:00")]],
            ),
        ]);
        let response = derive(MetricKind::InventoryTurnover, &set).to_json();

        assert_eq!(response["turnover_rates"][0]["month"], "January 2024");
        assert_eq!(response["turnover_rates"][0]["turnover_rate"], 2.5);
        assert_eq!(response["turnover_rates"][1]["month"], "February 2024");
        assert_eq!(response["turnover_rates"][1]["turnover_rate"], 0.0);
        assert_eq!(response["low_stock_alerts"][0]["product_name"], "Unknown");
        assert_eq!(response["low_stock_alerts"][0]["stock_quantity"], 2);
        assert_eq!(response["low_stock_alerts"][0]["restock_date"], "2024-02-10");
    }

    #[test]
    fn test_category_trends_grouped_by_month() {
        let response = derive(
            MetricKind::CategoryOrderTrends,
            &results(
                ids::CATEGORY_ORDER_TRENDS,
                vec![
                    text_row(&["2024-01-01", "Toys", "10.5"]),
                    text_row(&["2024-01-01", "Books", "3"]),
                    text_row(&["2024-02-01", "Toys", "7.25"]),
                ],
            ),
        );
        assert_eq!(
            response.to_json().to_string(),
            r#"{"order_trends":{"January 2024":{"Toys":10.5,"Books":3.0},"February 2024":{"Toys":7.25}}}"#
        );
    }

    #[test]
    fn test_top_customers_names() {
        let response = derive(
            MetricKind::TopCustomers,
            &results(ids::TOP_CUSTOMERS, vec![text_row(&["42", "1234.567"])]),
        )
        .to_json();
        assert_eq!(response["top_customers"][0]["customer_name"], "Customer 42");
        assert_eq!(response["top_customers"][0]["customer_id"], "42");
        assert_eq!(response["top_customers"][0]["revenue"], 1234.57);
    }
}
