pub mod insights;
pub mod ledger;
pub mod locks;
pub mod recommendations;
pub mod scoring;
