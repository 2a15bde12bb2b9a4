pub mod insight;
pub mod kpi;
pub mod report;
