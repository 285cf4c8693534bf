//! Metric descriptors

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::QueryError;
use crate::query::{MetricParams, QuerySpec};

/// Every dashboard metric the pipeline can compute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MetricKind {
    /// Count of all orders
    TotalOrders,
    /// Delayed share and in-transit count of shipments
    ShipmentStatusPercentage,
    /// Share of orders with a fulfillment event
    FulfillmentRate,
    /// Distinct products in an inventory status
    OutOfStock,
    /// Sum of order totals
    TotalSales,
    /// Average order value, high spenders, new and returning customers
    SalesMetrics,
    /// Revenue per month
    RevenueTrends,
    /// Mean of the most recent monthly sales
    ForecastedSales,
    /// Monthly turnover plus low-stock alerts
    InventoryTurnover,
    /// Best-selling products by quantity
    TopProducts,
    /// Customers ranked by revenue
    TopCustomers,
    /// Orders per shipment status
    ShipmentStatusCounts,
    /// Shipments per carrier and shipping method
    ShipmentPerformance,
    /// Orders per week and category
    WeeklyOrderTrends,
    /// Sales per month and category
    CategoryOrderTrends,
    /// Latest orders with product and shipment details
    RecentOrders,
}

impl MetricKind {
    pub const ALL: [MetricKind; 16] = [
        MetricKind::TotalOrders,
        MetricKind::ShipmentStatusPercentage,
        MetricKind::FulfillmentRate,
        MetricKind::OutOfStock,
        MetricKind::TotalSales,
        MetricKind::SalesMetrics,
        MetricKind::RevenueTrends,
        MetricKind::ForecastedSales,
        MetricKind::InventoryTurnover,
        MetricKind::TopProducts,
        MetricKind::TopCustomers,
        MetricKind::ShipmentStatusCounts,
        MetricKind::ShipmentPerformance,
        MetricKind::WeeklyOrderTrends,
        MetricKind::CategoryOrderTrends,
        MetricKind::RecentOrders,
    ];

    /// Stable kebab-case name, used on the command line and in logs
    pub fn name(&self) -> &'static str {
        match self {
            MetricKind::TotalOrders => "total-orders",
            MetricKind::ShipmentStatusPercentage => "shipment-status-percentage",
            MetricKind::FulfillmentRate => "fulfillment-rate",
            MetricKind::OutOfStock => "out-of-stock",
            MetricKind::TotalSales => "total-sales",
            MetricKind::SalesMetrics => "sales-metrics",
            MetricKind::RevenueTrends => "revenue-trends",
            MetricKind::ForecastedSales => "forecasted-sales",
            MetricKind::InventoryTurnover => "inventory-turnover",
            MetricKind::TopProducts => "top-products",
            MetricKind::TopCustomers => "top-customers",
            MetricKind::ShipmentStatusCounts => "shipment-status-counts",
            MetricKind::ShipmentPerformance => "shipment-performance",
            MetricKind::WeeklyOrderTrends => "weekly-order-trends",
            MetricKind::CategoryOrderTrends => "category-order-trends",
            MetricKind::RecentOrders => "recent-orders",
        }
    }

    /// Human wording for user-facing failure messages
    pub fn description(&self) -> &'static str {
        match self {
            MetricKind::TotalOrders => "total orders",
            MetricKind::ShipmentStatusPercentage => "shipment data",
            MetricKind::FulfillmentRate => "fulfillment rate",
            MetricKind::OutOfStock => "out-of-stock count",
            MetricKind::TotalSales => "total sales data",
            MetricKind::SalesMetrics => "sales metrics",
            MetricKind::RevenueTrends => "revenue trends",
            MetricKind::ForecastedSales => "forecasted sales",
            MetricKind::InventoryTurnover => "inventory metrics",
            MetricKind::TopProducts => "top selling products",
            MetricKind::TopCustomers => "top customers by revenue",
            MetricKind::ShipmentStatusCounts => "shipment status counts",
            MetricKind::ShipmentPerformance => "shipment performance data",
            MetricKind::WeeklyOrderTrends => "weekly order trends",
            MetricKind::CategoryOrderTrends => "order trends data",
            MetricKind::RecentOrders => "recent orders",
        }
    }

    /// Whether the metric only makes sense over an explicit date range
    pub fn requires_range(&self) -> bool {
        matches!(
            self,
            MetricKind::SalesMetrics
                | MetricKind::InventoryTurnover
                | MetricKind::TopProducts
                | MetricKind::TopCustomers
                | MetricKind::ShipmentStatusCounts
                | MetricKind::ShipmentPerformance
                | MetricKind::RecentOrders
        )
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for MetricKind {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MetricKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| QueryError::invalid("metric", format!("unknown metric '{}'", s)))
    }
}

/// A metric request with its statements already built
#[derive(Debug, Clone)]
pub struct MetricRequest {
    kind: MetricKind,
    params: MetricParams,
    specs: Vec<QuerySpec>,
}

impl MetricRequest {
    pub fn new(kind: MetricKind, params: MetricParams, specs: Vec<QuerySpec>) -> Self {
        MetricRequest {
            kind,
            params,
            specs,
        }
    }

    pub fn kind(&self) -> MetricKind {
        self.kind
    }

    pub fn params(&self) -> &MetricParams {
        &self.params
    }

    pub fn specs(&self) -> &[QuerySpec] {
        &self.specs
    }
}
