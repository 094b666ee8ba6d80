use std::fs;
use std::path::{Path, PathBuf};

use engine_logging::{engine_info, engine_warn};
use thiserror::Error;

const UTF8_BOM: char = '\u{feff}';

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contact {
    pub phone: String,
    pub title: String,
    pub category: String,
}

/// Accepted header spellings for each required column, matched case-insensitively.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactColumns {
    pub phone: Vec<String>,
    pub title: Vec<String>,
    pub category: Vec<String>,
}

impl Default for ContactColumns {
    fn default() -> Self {
        fn names(list: &[&str]) -> Vec<String> {
            list.iter().map(|name| name.to_string()).collect()
        }
        Self {
            phone: names(&["phone", "Telefon"]),
            title: names(&["title", "Ilan Basligi", "İlan Başlığı", "ilan_basligi"]),
            category: names(&["category", "IslemTipi", "İşlem Tipi", "islem_tipi"]),
        }
    }
}

#[derive(Debug, Error)]
pub enum ContactsError {
    #[error("cannot read contacts file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("contacts file {0} is not valid UTF-8")]
    Encoding(PathBuf),
    #[error("contacts file {path} has no `{column}` column")]
    MissingColumn { column: &'static str, path: PathBuf },
    #[error("contacts file {path}: {source}")]
    Csv { path: PathBuf, source: csv::Error },
}

/// Reads a contacts CSV whose delimiter is sniffed from the header line.
/// Rows that fail to parse are skipped with a warning.
pub fn load_contacts(path: &Path, columns: &ContactColumns) -> Result<Vec<Contact>, ContactsError> {
    let bytes = fs::read(path).map_err(|source| ContactsError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let text = String::from_utf8(bytes).map_err(|_| ContactsError::Encoding(path.to_path_buf()))?;
    let text = text.trim_start_matches(UTF8_BOM);

    let header_line = text.lines().next().unwrap_or("");
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(sniff_delimiter(header_line))
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers = reader
        .headers()
        .map_err(|source| ContactsError::Csv {
            path: path.to_path_buf(),
            source,
        })?
        .clone();
    let locate = |aliases: &[String], column: &'static str| {
        find_column(&headers, aliases).ok_or_else(|| ContactsError::MissingColumn {
            column,
            path: path.to_path_buf(),
        })
    };
    let phone_at = locate(&columns.phone, "phone")?;
    let title_at = locate(&columns.title, "title")?;
    let category_at = locate(&columns.category, "category")?;

    let mut contacts = Vec::new();
    for (index, row) in reader.records().enumerate() {
        let row = match row {
            Ok(row) => row,
            Err(err) => {
                engine_warn!("skipping unreadable contacts row {}: {}", index + 2, err);
                continue;
            }
        };
        let cell = |at: usize| row.get(at).unwrap_or("").trim().to_string();
        contacts.push(Contact {
            phone: cell(phone_at),
            title: cell(title_at),
            category: cell(category_at),
        });
    }
    engine_info!("loaded {} contacts from {}", contacts.len(), path.display());
    Ok(contacts)
}

fn sniff_delimiter(header_line: &str) -> u8 {
    if header_line.contains(',') {
        b','
    } else if header_line.contains(';') {
        b';'
    } else {
        b'\t'
    }
}

fn find_column(headers: &csv::StringRecord, aliases: &[String]) -> Option<usize> {
    headers.iter().position(|header| {
        let header = header.trim().to_lowercase();
        aliases.iter().any(|alias| alias.to_lowercase() == header)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sniffs_common_delimiters() {
        assert_eq!(sniff_delimiter("a,b;c"), b',');
        assert_eq!(sniff_delimiter("a;b"), b';');
        assert_eq!(sniff_delimiter("a\tb"), b'\t');
        assert_eq!(sniff_delimiter("single"), b'\t');
    }
}
