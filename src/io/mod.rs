//! File output: CSV audit exports and dry-run plans.

mod export;
mod plan;

pub use export::{
    CsvExporter, ExportCounts, write_addresses, write_attributes, write_contacts, write_people,
};
pub use plan::PlanWriter;
