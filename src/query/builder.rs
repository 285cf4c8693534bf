//! SQL templates for every metric
//!
//! `QueryBuilder::build` turns a metric kind and validated parameters into
//! the statements that metric needs. Only values from `MetricParams` are
//! interpolated, and only through their canonical renderings:
//!
//! | Value | Rendering |
//! |-------|-----------|
//! | date range | `TIMESTAMP 'YYYY-MM-DD HH:MM:SS'` |
//! | threshold / limit | decimal `u64` |
//! | status filter | quoted literal, `'` doubled |

use crate::error::QueryError;
use crate::pipeline::{MetricKind, MetricRequest};

use super::params::MetricParams;
use super::spec::QuerySpec;

/// Query ids, one per statement template
pub mod ids {
    pub const TOTAL_ORDERS: &str = "total_orders";
    pub const SHIPMENT_STATUS_PERCENTAGE: &str = "shipment_status_percentage";
    pub const FULFILLMENT_RATE: &str = "fulfillment_rate";
    pub const OUT_OF_STOCK: &str = "out_of_stock";
    pub const TOTAL_SALES: &str = "total_sales";
    pub const AVG_ORDER_VALUE: &str = "avg_order_value";
    pub const HIGH_SPENDERS: &str = "high_spenders";
    pub const NEW_CUSTOMERS: &str = "new_customers";
    pub const RETURNING_CUSTOMERS: &str = "returning_customers";
    pub const REVENUE_TRENDS: &str = "revenue_trends";
    pub const FORECASTED_SALES: &str = "forecasted_sales";
    pub const INVENTORY_TURNOVER: &str = "inventory_turnover";
    pub const LOW_STOCK: &str = "low_stock";
    pub const TOP_PRODUCTS: &str = "top_products";
    pub const TOP_CUSTOMERS: &str = "top_customers";
    pub const SHIPMENT_STATUS_COUNTS: &str = "shipment_status_counts";
    pub const SHIPMENT_PERFORMANCE: &str = "shipment_performance";
    pub const WEEKLY_ORDER_TRENDS: &str = "weekly_order_trends";
    pub const CATEGORY_ORDER_TRENDS: &str = "category_order_trends";
    pub const RECENT_ORDERS: &str = "recent_orders";
}

/// Default spend above which a customer counts as a high spender
pub const DEFAULT_HIGH_SPENDER_THRESHOLD: u64 = 95578;
/// Default stock level at or below which a product is listed as low stock
pub const DEFAULT_LOW_STOCK_THRESHOLD: u64 = 10;
pub const DEFAULT_FORECAST_WINDOW: u64 = 6;
pub const DEFAULT_LOW_STOCK_LIMIT: u64 = 3;
pub const DEFAULT_TOP_PRODUCTS: u64 = 5;
pub const DEFAULT_TOP_CUSTOMERS: u64 = 7;
pub const DEFAULT_RECENT_ORDERS: u64 = 5;

const FULFILLED_EVENTS: &str = "'Shipped', 'Same-Day Delivery', 'Ship to Home', \
     'Store Pickup', 'Curbside Pickup', 'Locker Pickup'";

/// Stateless statement factory; safe to share between requests
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryBuilder;

impl QueryBuilder {
    pub fn new() -> Self {
        QueryBuilder
    }

    /// Build every statement `kind` needs.
    ///
    /// Range requirements are checked before any SQL is assembled.
    pub fn build(&self, kind: MetricKind, params: &MetricParams) -> Result<MetricRequest, QueryError> {
        if kind.requires_range() {
            params.require_range()?;
        }

        let specs = match kind {
            MetricKind::TotalOrders => vec![total_orders(params)],
            MetricKind::ShipmentStatusPercentage => vec![shipment_status_percentage()],
            MetricKind::FulfillmentRate => vec![fulfillment_rate(params)],
            MetricKind::OutOfStock => vec![out_of_stock(params)],
            MetricKind::TotalSales => vec![total_sales(params)],
            MetricKind::SalesMetrics => sales_metrics(params)?,
            MetricKind::RevenueTrends => vec![revenue_trends(params)],
            MetricKind::ForecastedSales => vec![forecasted_sales(params)],
            MetricKind::InventoryTurnover => inventory_turnover(params)?,
            MetricKind::TopProducts => vec![top_products(params)?],
            MetricKind::TopCustomers => vec![top_customers(params)?],
            MetricKind::ShipmentStatusCounts => vec![shipment_status_counts(params)?],
            MetricKind::ShipmentPerformance => vec![shipment_performance(params)?],
            MetricKind::WeeklyOrderTrends => vec![weekly_order_trends(params)],
            MetricKind::CategoryOrderTrends => vec![category_order_trends(params)],
            MetricKind::RecentOrders => vec![recent_orders(params)?],
        };

        Ok(MetricRequest::new(kind, params.clone(), specs))
    }
}

// ============================================================================
// Range helpers
// ============================================================================

/// `WHERE <column> BETWEEN ...` when a range was supplied, else empty
fn where_range(params: &MetricParams, column: &str) -> String {
    match params.range() {
        Some(range) => format!("WHERE {}", range.between(column)),
        None => String::new(),
    }
}

fn required_between(params: &MetricParams, column: &str) -> Result<String, QueryError> {
    Ok(params.require_range()?.between(column))
}

// ============================================================================
// Scalar aggregates
// ============================================================================

fn total_orders(params: &MetricParams) -> QuerySpec {
    let sql = format!(
        "SELECT COUNT(*) AS total_orders FROM orders {}",
        where_range(params, "order_date")
    );
    QuerySpec::new(ids::TOTAL_ORDERS, sql.trim_end(), 1)
}

fn shipment_status_percentage() -> QuerySpec {
    QuerySpec::new(
        ids::SHIPMENT_STATUS_PERCENTAGE,
        "SELECT
            COUNT(*) AS total_orders,
            SUM(CASE WHEN shipment_status = 'Delayed' THEN 1 ELSE 0 END) AS delayed_orders,
            SUM(CASE WHEN shipment_status = 'In Transit' THEN 1 ELSE 0 END) AS in_transit_orders
        FROM shipment",
        3,
    )
}

fn fulfillment_rate(params: &MetricParams) -> QuerySpec {
    let sql = format!(
        "SELECT
            COUNT(e.order_id) AS fulfilled_orders,
            COUNT(o.order_id) AS total_orders
        FROM orders o
        LEFT JOIN fulfillment_event e
            ON o.order_id = e.order_id
            AND e.event_type IN ({})
        {}",
        FULFILLED_EVENTS,
        where_range(params, "o.order_date")
    );
    QuerySpec::new(ids::FULFILLMENT_RATE, sql, 2)
}

fn out_of_stock(params: &MetricParams) -> QuerySpec {
    let sql = format!(
        "SELECT COUNT(DISTINCT product_id) AS out_of_stock_count
        FROM inventory
        WHERE status = {}",
        params.status_or("Out of Stock")
    );
    QuerySpec::new(ids::OUT_OF_STOCK, sql, 1)
}

fn total_sales(params: &MetricParams) -> QuerySpec {
    let sql = format!(
        "SELECT SUM(total_amount) AS total_sales FROM orders {}",
        where_range(params, "order_date")
    );
    QuerySpec::new(ids::TOTAL_SALES, sql.trim_end(), 1)
}

/// Four independent statements over the same range
fn sales_metrics(params: &MetricParams) -> Result<Vec<QuerySpec>, QueryError> {
    let range = required_between(params, "order_date")?;
    let threshold = params.threshold_or(DEFAULT_HIGH_SPENDER_THRESHOLD);

    Ok(vec![
        QuerySpec::new(
            ids::AVG_ORDER_VALUE,
            format!(
                "SELECT ROUND(AVG(total_amount), 2) AS avg_order_value
                FROM orders
                WHERE {}",
                range
            ),
            1,
        ),
        QuerySpec::new(
            ids::HIGH_SPENDERS,
            format!(
                "SELECT COUNT(DISTINCT customer_id) AS high_spenders FROM (
                    SELECT customer_id, SUM(total_amount) AS total_spent
                    FROM orders
                    WHERE {}
                    GROUP BY customer_id
                    HAVING SUM(total_amount) > {}
                ) AS high_spender_customers",
                range, threshold
            ),
            1,
        ),
        QuerySpec::new(
            ids::NEW_CUSTOMERS,
            format!(
                "SELECT COUNT(customer_id) AS new_customers FROM (
                    SELECT customer_id
                    FROM orders
                    WHERE {}
                    GROUP BY customer_id
                    HAVING COUNT(order_id) = 1
                ) AS new_customers",
                range
            ),
            1,
        ),
        QuerySpec::new(
            ids::RETURNING_CUSTOMERS,
            format!(
                "SELECT COUNT(customer_id) AS returning_customers FROM (
                    SELECT customer_id
                    FROM orders
                    WHERE {}
                    GROUP BY customer_id
                    HAVING COUNT(order_id) > 1
                ) AS returning_customers",
                range
            ),
            1,
        ),
    ])
}

// ============================================================================
// Time-bucketed aggregates
// ============================================================================

fn revenue_trends(params: &MetricParams) -> QuerySpec {
    let sql = format!(
        "SELECT
            DATE_TRUNC('month', order_date) AS month,
            SUM(subtotal) AS monthly_revenue
        FROM orders
        {}
        GROUP BY month
        ORDER BY month DESC",
        where_range(params, "order_date")
    );
    QuerySpec::new(ids::REVENUE_TRENDS, sql, 2)
}

/// The window size is the statement's LIMIT; the calculator just averages
fn forecasted_sales(params: &MetricParams) -> QuerySpec {
    let sql = format!(
        "SELECT
            DATE_TRUNC('month', order_date) AS month,
            SUM(total_amount) AS monthly_sales
        FROM orders
        {}
        GROUP BY month
        ORDER BY month DESC
        LIMIT {}",
        where_range(params, "order_date"),
        params.limit_or(DEFAULT_FORECAST_WINDOW)
    );
    QuerySpec::new(ids::FORECASTED_SALES, sql, 2)
}

fn weekly_order_trends(params: &MetricParams) -> QuerySpec {
    let sql = format!(
        "SELECT
            DATE_TRUNC('WEEK', o.order_date) AS week_start,
            p.category_id,
            COUNT(o.order_id) AS order_count
        FROM orders o
        JOIN products p ON o.product_id = p.id
        {}
        GROUP BY week_start, p.category_id
        ORDER BY week_start ASC",
        where_range(params, "o.order_date")
    );
    QuerySpec::new(ids::WEEKLY_ORDER_TRENDS, sql, 3)
}

fn category_order_trends(params: &MetricParams) -> QuerySpec {
    let sql = format!(
        "SELECT
            DATE_TRUNC('month', o.order_date) AS month,
            c.name AS category,
            SUM(o.quantity * o.unit_price) AS total_sales
        FROM orders o
        JOIN products p ON o.product_id = p.id
        JOIN categories c ON p.category_id = c.id
        {}
        GROUP BY month, category
        ORDER BY month",
        where_range(params, "o.order_date")
    );
    QuerySpec::new(ids::CATEGORY_ORDER_TRENDS, sql, 3)
}

// ============================================================================
// Multi-stage compositions
// ============================================================================

/// Turnover CTE and low-stock top-N; independent of each other
fn inventory_turnover(params: &MetricParams) -> Result<Vec<QuerySpec>, QueryError> {
    let sold_range = required_between(params, "o.order_date")?;
    let stock_range = required_between(params, "i.restock_date")?;

    let turnover = format!(
        "WITH monthly_sales AS (
            SELECT
                DATE_TRUNC('month', o.order_date) AS month,
                SUM(o.quantity) AS total_sold
            FROM orders o
            WHERE {}
            GROUP BY month
        ),
        monthly_inventory AS (
            SELECT
                DATE_TRUNC('month', i.restock_date) AS month,
                AVG(i.stock_quantity) AS avg_stock
            FROM inventory i
            WHERE {}
            GROUP BY month
        )
        SELECT
            COALESCE(ms.month, mi.month) AS month,
            COALESCE(ms.total_sold, 0) AS total_sold,
            mi.avg_stock
        FROM monthly_sales ms
        FULL OUTER JOIN monthly_inventory mi ON ms.month = mi.month
        ORDER BY month",
        sold_range, stock_range
    );

    let low_stock = format!(
        "SELECT
            p.name AS product_name,
            i.stock_quantity,
            i.restock_date
        FROM inventory i
        JOIN products p ON i.product_id = p.id
        WHERE i.status = {}
            AND i.stock_quantity <= {}
        ORDER BY i.stock_quantity ASC
        LIMIT {}",
        params.status_or("Low Stock"),
        params.threshold_or(DEFAULT_LOW_STOCK_THRESHOLD),
        params.limit_or(DEFAULT_LOW_STOCK_LIMIT)
    );

    Ok(vec![
        QuerySpec::new(ids::INVENTORY_TURNOVER, turnover, 3),
        QuerySpec::new(ids::LOW_STOCK, low_stock, 3),
    ])
}

fn shipment_status_counts(params: &MetricParams) -> Result<QuerySpec, QueryError> {
    let delivered = required_between(params, "actual_delivery_date")?;
    let events = required_between(params, "event_time")?;
    let sql = format!(
        "SELECT 'Delivered' AS status, COUNT(*) AS count
        FROM shipment
        WHERE shipment_status = 'Delivered'
            AND {}
        UNION ALL
        SELECT event_type AS status, COUNT(*) AS count
        FROM fulfillment_event
        WHERE event_type IN ('Shipped', 'Pending', 'Cancelled', 'Return Received')
            AND {}
        GROUP BY event_type",
        delivered, events
    );
    Ok(QuerySpec::new(ids::SHIPMENT_STATUS_COUNTS, sql, 2))
}

fn shipment_performance(params: &MetricParams) -> Result<QuerySpec, QueryError> {
    let sql = format!(
        "WITH shipment_counts AS (
            SELECT
                carrier,
                shipping_method,
                COUNT(*) AS total_shipments
            FROM shipment
            WHERE {}
            GROUP BY carrier, shipping_method
        )
        SELECT
            carrier,
            SUM(CASE WHEN shipping_method = 'Standard' THEN total_shipments ELSE 0 END) AS standard_shipments,
            SUM(CASE WHEN shipping_method = 'Expedited' THEN total_shipments ELSE 0 END) AS expedited_shipments,
            SUM(CASE WHEN shipping_method = 'Same-Day' THEN total_shipments ELSE 0 END) AS same_day_shipments
        FROM shipment_counts
        GROUP BY carrier
        ORDER BY carrier",
        required_between(params, "actual_delivery_date")?
    );
    Ok(QuerySpec::new(ids::SHIPMENT_PERFORMANCE, sql, 4))
}

// ============================================================================
// Ranked top-N
// ============================================================================

fn top_products(params: &MetricParams) -> Result<QuerySpec, QueryError> {
    let sql = format!(
        "SELECT
            p.name AS product_name,
            SUM(o.quantity) AS total_quantity,
            ROUND(SUM(o.quantity) * 100.0 / NULLIF(
                (SELECT SUM(quantity) FROM orders WHERE {}), 0), 2) AS percentage
        FROM orders o
        JOIN products p ON o.product_id = p.id
        WHERE {}
        GROUP BY p.name
        ORDER BY total_quantity DESC
        LIMIT {}",
        required_between(params, "order_date")?,
        required_between(params, "o.order_date")?,
        params.limit_or(DEFAULT_TOP_PRODUCTS)
    );
    Ok(QuerySpec::new(ids::TOP_PRODUCTS, sql, 3))
}

fn top_customers(params: &MetricParams) -> Result<QuerySpec, QueryError> {
    let sql = format!(
        "SELECT
            o.customer_id,
            ROUND(SUM(o.total_amount), 2) AS total_revenue
        FROM orders o
        WHERE {}
        GROUP BY o.customer_id
        ORDER BY total_revenue DESC
        LIMIT {}",
        required_between(params, "o.order_date")?,
        params.limit_or(DEFAULT_TOP_CUSTOMERS)
    );
    Ok(QuerySpec::new(ids::TOP_CUSTOMERS, sql, 2))
}

fn recent_orders(params: &MetricParams) -> Result<QuerySpec, QueryError> {
    let sql = format!(
        "SELECT
            o.order_id,
            p.name AS product_name,
            c.name AS category_name,
            o.unit_price,
            o.order_type,
            COALESCE(s.shipment_status, 'Pending') AS shipment_status
        FROM orders o
        LEFT JOIN products p ON o.product_id = p.id
        LEFT JOIN categories c ON p.category_id = c.id
        LEFT JOIN shipment s ON o.order_id = s.order_id
        WHERE {}
        {}
        ORDER BY o.order_date DESC
        LIMIT {}",
        required_between(params, "o.order_date")?,
        match params.status() {
            Some(status) => format!(
                "AND COALESCE(s.shipment_status, 'Pending') = {}",
                status.sql_literal()
            ),
            None => String::new(),
        },
        params.limit_or(DEFAULT_RECENT_ORDERS)
    );
    Ok(QuerySpec::new(ids::RECENT_ORDERS, sql, 6))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::DateRange;

    fn january() -> MetricParams {
        MetricParams::new().with_range(DateRange::parse("2024-01-01", "2024-01-31T23:59:59").unwrap())
    }

    #[test]
    fn test_every_metric_builds_with_a_range() {
        let builder = QueryBuilder::new();
        for kind in MetricKind::ALL {
            let request = builder.build(kind, &january()).unwrap();
            assert!(!request.specs().is_empty(), "{}", kind);
            for spec in request.specs() {
                assert!(spec.columns() > 0);
                assert!(!spec.sql().contains(';'), "{}", spec.id());
            }
        }
    }

    #[test]
    fn test_fan_out_widths() {
        let builder = QueryBuilder::new();
        let width = |kind| builder.build(kind, &january()).unwrap().specs().len();
        assert_eq!(width(MetricKind::SalesMetrics), 4);
        assert_eq!(width(MetricKind::InventoryTurnover), 2);
        assert_eq!(width(MetricKind::TotalOrders), 1);
    }

    #[test]
    fn test_range_scoped_metrics_require_range() {
        let builder = QueryBuilder::new();
        for kind in MetricKind::ALL {
            let result = builder.build(kind, &MetricParams::new());
            assert_eq!(result.is_err(), kind.requires_range(), "{}", kind);
        }
    }

    #[test]
    fn test_unscoped_metric_applies_optional_range() {
        let builder = QueryBuilder::new();

        let all = builder.build(MetricKind::TotalOrders, &MetricParams::new()).unwrap();
        assert_eq!(all.specs()[0].sql(), "SELECT COUNT(*) AS total_orders FROM orders");

        let ranged = builder.build(MetricKind::TotalOrders, &january()).unwrap();
        assert!(ranged.specs()[0].sql().contains(
            "WHERE order_date BETWEEN TIMESTAMP '2024-01-01 00:00:00' AND TIMESTAMP '2024-01-31 23:59:59'"
        ));
    }

    #[test]
    fn test_threshold_and_limit_rendered() {
        let builder = QueryBuilder::new();

        let params = january().with_threshold(500).with_limit(9).unwrap();
        let request = builder.build(MetricKind::SalesMetrics, &params).unwrap();
        let high = request.specs().iter().find(|s| s.id() == ids::HIGH_SPENDERS).unwrap();
        assert!(high.sql().contains("HAVING SUM(total_amount) > 500"));

        let request = builder.build(MetricKind::SalesMetrics, &january()).unwrap();
        let high = request.specs().iter().find(|s| s.id() == ids::HIGH_SPENDERS).unwrap();
        assert!(high.sql().contains("> 95578"));

        let request = builder.build(MetricKind::TopCustomers, &params).unwrap();
        assert!(request.specs()[0].sql().trim_end().ends_with("LIMIT 9"));

        let request = builder.build(MetricKind::ForecastedSales, &MetricParams::new()).unwrap();
        assert!(request.specs()[0].sql().trim_end().ends_with("LIMIT 6"));
    }

    #[test]
    fn test_injection_attempts_never_reach_sql() {
        let err = MetricParams::from_pairs([
            ("start_date", "2024-01-01' OR '1'='1"),
            ("end_date", "2024-01-31"),
        ])
        .unwrap_err();
        assert!(err.is_client_error());

        let err = MetricParams::from_pairs([("status", "x'; DROP TABLE inventory; --")]).unwrap_err();
        assert!(err.is_client_error());

        let params = MetricParams::from_pairs([("status", "O'Brien")]).unwrap();
        let request = QueryBuilder::new().build(MetricKind::OutOfStock, &params).unwrap();
        assert!(request.specs()[0].sql().contains("WHERE status = 'O''Brien'"));
    }

    #[test]
    fn test_ids_unique_within_request() {
        let builder = QueryBuilder::new();
        for kind in MetricKind::ALL {
            let request = builder.build(kind, &january()).unwrap();
            let mut ids: Vec<_> = request.specs().iter().map(|s| s.id()).collect();
            ids.sort_unstable();
            ids.dedup();
            assert_eq!(ids.len(), request.specs().len(), "{}", kind);
        }
    }
}
