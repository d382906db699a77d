//! Output files: CBZ archives and series metadata

use serde::Serialize;
use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::model::{SeriesDetails, SeriesKey};
use crate::Result;

/// Reader metadata stored as `ComicInfo.xml` inside each archive
#[derive(Debug, Clone)]
pub struct ComicInfo {
    pub series: String,
    pub title: String,
    pub number: String,
    pub page_count: usize,
    pub web: String,
    pub genres: Vec<String>,
    pub writer: Option<String>,
}

impl ComicInfo {
    pub fn to_xml(&self) -> String {
        let mut xml = String::from(
            "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n<ComicInfo xmlns:xsi=\"http://www.w3.org/2001/XMLSchema-instance\" xmlns:xsd=\"http://www.w3.org/2001/XMLSchema\">\n",
        );
        push_element(&mut xml, "Series", &self.series);
        push_element(&mut xml, "Title", &self.title);
        push_element(&mut xml, "Number", &self.number);
        push_element(&mut xml, "PageCount", &self.page_count.to_string());
        if let Some(writer) = &self.writer {
            push_element(&mut xml, "Writer", writer);
        }
        if !self.genres.is_empty() {
            push_element(&mut xml, "Genre", &self.genres.join(", "));
        }
        push_element(&mut xml, "Web", &self.web);
        push_element(&mut xml, "Manga", "Yes");
        xml.push_str("</ComicInfo>\n");
        xml
    }
}

fn push_element(xml: &mut String, name: &str, value: &str) {
    xml.push_str(&format!("  <{}>{}</{}>\n", name, escape_xml(value), name));
}

fn escape_xml(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            c => escaped.push(c),
        }
    }
    escaped
}

/// Writes a deflate-compressed CBZ with the pages in order, then `ComicInfo.xml`
///
/// A partially written archive is removed on error.
pub fn write_cbz(path: &Path, pages: &[(String, Vec<u8>)], info: &ComicInfo) -> Result<()> {
    let result = write_zip(path, pages, info);
    if result.is_err() {
        let _ = std::fs::remove_file(path);
    }
    result
}

fn write_zip(path: &Path, pages: &[(String, Vec<u8>)], info: &ComicInfo) -> Result<()> {
    let file = File::create(path)?;
    let mut zip = zip::ZipWriter::new(file);
    let options =
        zip::write::FileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    for (name, data) in pages {
        zip.start_file(name.as_str(), options)?;
        zip.write_all(data)?;
    }

    zip.start_file("ComicInfo.xml", options)?;
    zip.write_all(info.to_xml().as_bytes())?;
    zip.finish()?;
    Ok(())
}

/// Contents of `series.json` next to the archives
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct SeriesMetadata {
    pub name: String,
    pub source: String,
    pub series_key: String,
    pub description: Option<String>,
    pub status: Option<String>,
    pub genres: Vec<String>,
    pub authors: Vec<String>,
    #[serde(rename = "Type")]
    pub kind: String,
    pub date_added: String,
    pub provider: String,
}

impl SeriesMetadata {
    pub fn new(title: &str, series: &SeriesKey, details: &SeriesDetails) -> Self {
        Self {
            name: title.to_string(),
            source: series.source().display_name().to_string(),
            series_key: series.to_string(),
            description: details.description.clone(),
            status: details.status.clone(),
            genres: details.genres.clone(),
            authors: details.authors.clone(),
            kind: "manga".to_string(),
            date_added: chrono::Utc::now().to_rfc3339(),
            provider: env!("CARGO_PKG_NAME").to_string(),
        }
    }

    pub fn write(&self, dir: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(dir.join("series.json"), json)?;
        Ok(())
    }
}
