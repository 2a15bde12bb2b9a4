use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("company {0} not found")]
    CompanyNotFound(String),

    /// An aggregate query failed; no partial report is produced.
    #[error("data unavailable for company {company_id}: {detail}")]
    DataUnavailable { company_id: String, detail: String },
}

impl ReportError {
    pub(crate) fn data(company_id: &str, err: anyhow::Error) -> Self {
        Self::DataUnavailable {
            company_id: company_id.to_string(),
            detail: format!("{err:#}"),
        }
    }
}
