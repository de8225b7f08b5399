//! CSV audit export of a loaded batch.
//!
//! Writes four files into the output directory:
//!
//! | File | One row per |
//! |------|-------------|
//! | `people.csv` | person |
//! | `contacts.csv` | phone number or email address |
//! | `addresses.csv` | postal address |
//! | `attributes.csv` | custom attribute |

use crate::models::PersonRecord;
use crate::{Error, Result};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Rows written per file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExportCounts {
    /// `people.csv` rows.
    pub people: usize,
    /// `contacts.csv` rows.
    pub contacts: usize,
    /// `addresses.csv` rows.
    pub addresses: usize,
    /// `attributes.csv` rows.
    pub attributes: usize,
}

fn csv_error(operation: &str) -> impl Fn(csv::Error) -> Error + '_ {
    move |e| Error::failed(operation, e)
}

/// Writes the audit CSV files.
pub struct CsvExporter {
    directory: PathBuf,
}

impl CsvExporter {
    /// File names, in write order.
    pub const FILES: [&'static str; 4] =
        ["people.csv", "contacts.csv", "addresses.csv", "attributes.csv"];

    /// Creates an exporter writing into `directory`.
    #[must_use]
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    /// Returns the output directory.
    #[must_use]
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn create(&self, name: &str) -> Result<csv::Writer<File>> {
        let path = self.directory.join(name);
        let file = File::create(&path)
            .map_err(|e| Error::failed("create_export_file", format!("{}: {e}", path.display())))?;
        Ok(csv::WriterBuilder::new().from_writer(file))
    }

    /// Writes all four files for `records`, replacing existing ones.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or any file cannot be written.
    pub fn export(&self, records: &[PersonRecord]) -> Result<ExportCounts> {
        std::fs::create_dir_all(&self.directory)
            .map_err(|e| Error::failed("create_export_dir", e))?;

        let counts = ExportCounts {
            people: write_people(self.create(Self::FILES[0])?, records)?,
            contacts: write_contacts(self.create(Self::FILES[1])?, records)?,
            addresses: write_addresses(self.create(Self::FILES[2])?, records)?,
            attributes: write_attributes(self.create(Self::FILES[3])?, records)?,
        };

        tracing::info!(
            directory = %self.directory.display(),
            people = counts.people,
            contacts = counts.contacts,
            addresses = counts.addresses,
            attributes = counts.attributes,
            "Exported audit files"
        );
        Ok(counts)
    }
}

/// Writes one row per person.
///
/// # Errors
///
/// Returns an error if a row cannot be written.
pub fn write_people<W: Write>(mut writer: csv::Writer<W>, records: &[PersonRecord]) -> Result<usize> {
    writer
        .write_record([
            "id",
            "household_id",
            "first_name",
            "preferred_name",
            "middle_name",
            "last_name",
            "gender",
            "date_of_birth",
            "marital_status",
            "last_updated",
        ])
        .map_err(csv_error("write_people_csv"))?;

    for record in records {
        writer
            .write_record([
                record.id.to_string(),
                record.household_id.map(|h| h.to_string()).unwrap_or_default(),
                record.first_name.clone(),
                record.preferred_name.clone().unwrap_or_default(),
                record.middle_name.clone(),
                record.last_name.clone(),
                record.gender.map(|g| g.as_str().to_string()).unwrap_or_default(),
                record.dob_string(),
                record.marital_status.clone().unwrap_or_default(),
                record.last_updated.format("%Y-%m-%d %H:%M:%S").to_string(),
            ])
            .map_err(csv_error("write_people_csv"))?;
    }
    writer.flush().map_err(|e| Error::failed("flush_csv", e))?;
    Ok(records.len())
}

/// Writes one row per phone number and email address.
///
/// # Errors
///
/// Returns an error if a row cannot be written.
pub fn write_contacts<W: Write>(
    mut writer: csv::Writer<W>,
    records: &[PersonRecord],
) -> Result<usize> {
    writer
        .write_record(["person_id", "type", "location", "value"])
        .map_err(csv_error("write_contacts_csv"))?;

    let mut rows = 0;
    for record in records {
        let id = record.id.to_string();
        for phone in &record.phones {
            writer
                .write_record([id.as_str(), "phone", phone.kind.as_str(), phone.display.as_str()])
                .map_err(csv_error("write_contacts_csv"))?;
            rows += 1;
        }
        for email in &record.emails {
            writer
                .write_record([id.as_str(), "email", email.kind.as_str(), email.address.as_str()])
                .map_err(csv_error("write_contacts_csv"))?;
            rows += 1;
        }
    }
    writer.flush().map_err(|e| Error::failed("flush_csv", e))?;
    Ok(rows)
}

/// Writes one row per postal address.
///
/// # Errors
///
/// Returns an error if a row cannot be written.
pub fn write_addresses<W: Write>(
    mut writer: csv::Writer<W>,
    records: &[PersonRecord],
) -> Result<usize> {
    writer
        .write_record(["person_id", "street1", "street2", "city", "state", "postal_code"])
        .map_err(csv_error("write_addresses_csv"))?;

    let mut rows = 0;
    for record in records {
        let id = record.id.to_string();
        for address in &record.addresses {
            writer
                .write_record([
                    id.as_str(),
                    address.street1.as_str(),
                    address.street2.as_str(),
                    address.city.as_str(),
                    address.state.as_str(),
                    address.postal_code.as_str(),
                ])
                .map_err(csv_error("write_addresses_csv"))?;
            rows += 1;
        }
    }
    writer.flush().map_err(|e| Error::failed("flush_csv", e))?;
    Ok(rows)
}

/// Writes one row per custom attribute.
///
/// # Errors
///
/// Returns an error if a row cannot be written.
pub fn write_attributes<W: Write>(
    mut writer: csv::Writer<W>,
    records: &[PersonRecord],
) -> Result<usize> {
    writer
        .write_record(["person_id", "attribute_id", "value"])
        .map_err(csv_error("write_attributes_csv"))?;

    let mut rows = 0;
    for record in records {
        let id = record.id.to_string();
        for attribute in &record.attributes {
            writer
                .write_record([id.clone(), attribute.attribute_id.to_string(), attribute.value.clone()])
                .map_err(csv_error("write_attributes_csv"))?;
            rows += 1;
        }
    }
    writer.flush().map_err(|e| Error::failed("flush_csv", e))?;
    Ok(rows)
}
