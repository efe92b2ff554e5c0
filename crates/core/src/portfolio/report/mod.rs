//! Pipeline orchestration and the report handed to consumers.

mod portfolio_service;
mod report_model;

#[cfg(test)]
mod portfolio_service_tests;

pub use portfolio_service::{compute_portfolio, PortfolioService};
pub use report_model::{
    FlowSummary, IncomeExpenseTotals, PortfolioReport, ReportDiagnostics, ValuedPosition,
};
