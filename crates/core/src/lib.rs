pub mod app;
pub mod config;
pub mod delivery;
pub mod domain;
pub mod guard;
pub mod insights;
pub mod kpi;
pub mod llm;
pub mod pipeline;
pub mod recommend;
pub mod retry;
pub mod storage;
pub mod time;

#[cfg(test)]
mod testkit;
