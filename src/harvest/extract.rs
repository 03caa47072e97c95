//! Detail-page extraction.
//!
//! One vacancy detail page is turned into a [`VacancyRecord`] by a fixed set
//! of structural selectors and patterns. Every rule is independently
//! optional: a selector or pattern that does not match leaves its field out
//! of the record and never fails the page.

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use thiserror::Error;

use crate::model::{keys, VacancyRecord};

/// Errors that can occur while setting up the extractor.
///
/// Extraction itself is infallible; only compiling the fixed selectors and
/// patterns can fail, and that happens once in [`DetailExtractor::new`].
#[derive(Error, Debug)]
pub enum ExtractError {
    /// A structural selector failed to compile.
    #[error("Invalid selector '{selector}': {message}")]
    Selector { selector: String, message: String },

    /// An extraction pattern failed to compile.
    #[error("Invalid pattern: {0}")]
    Pattern(#[from] regex::Error),
}

fn selector(css: &str) -> Result<Selector, ExtractError> {
    Selector::parse(css).map_err(|e| ExtractError::Selector {
        selector: css.to_string(),
        message: e.to_string(),
    })
}

/// Collected and trimmed text of one element.
fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

/// Extracts a field mapping from detail-page HTML.
///
/// Selectors and patterns are compiled once and reused across pages. The
/// extractor is unaware of the page's URL; the pipeline assigns it under
/// [`keys::URL`] afterwards.
pub struct DetailExtractor {
    list_property: Selector,
    property_label: Selector,
    property_value: Selector,
    school_name: Selector,
    school_link: Selector,
    job_title: Selector,
    address_block: Selector,
    address_line: Selector,
    map_link: Selector,
    school_id_pattern: Regex,
    postal_pattern: Regex,
    coordinate_pattern: Regex,
}

impl DetailExtractor {
    /// # Errors
    ///
    /// Returns [`ExtractError`] if any selector or pattern fails to compile.
    pub fn new() -> Result<Self, ExtractError> {
        Ok(Self {
            list_property: selector(".list-property")?,
            property_label: selector("label")?,
            property_value: selector("div")?,
            school_name: selector(".text-center.text-md-start.mt-3.mt-md-0 h2")?,
            school_link: selector(r#"a[href^="https://www.meesterbaan.nl/school/"]"#)?,
            job_title: selector("h1.mt-3.mt-md-0")?,
            address_block: selector(".body-medium-default.school-adres-gegevens")?,
            address_line: selector(".ms-2 > div")?,
            map_link: selector(r##"#school-map-container a[href^="http://maps.google.com/maps?q="]"##)?,
            school_id_pattern: Regex::new(r"/school/(\d+)/")?,
            postal_pattern: Regex::new(r"(\d{4}\s?[A-Za-z]{2})\s+(.*)")?,
            coordinate_pattern: Regex::new(r"q=(\d+\.\d+),(\d+\.\d+)")?,
        })
    }

    /// Extracts all matching fields from one detail page.
    pub fn extract(&self, html: &str) -> VacancyRecord {
        let document = Html::parse_document(html);
        let mut record = VacancyRecord::new();

        self.extract_list_properties(&document, &mut record);
        self.extract_school_name(&document, &mut record);
        self.extract_school_id(&document, &mut record);
        self.extract_job_title(&document, &mut record);
        self.extract_address(&document, &mut record);
        self.extract_coordinates(&document, &mut record);

        record
    }

    /// Every `.list-property` element with both a label and a value child
    /// contributes one label text → value text pair.
    fn extract_list_properties(&self, document: &Html, record: &mut VacancyRecord) {
        for property in document.select(&self.list_property) {
            let label = property.select(&self.property_label).next();
            let value = property.select(&self.property_value).next();

            if let (Some(label), Some(value)) = (label, value) {
                let key = element_text(label);
                if !key.is_empty() {
                    record.insert(key, element_text(value));
                }
            }
        }
    }

    fn extract_school_name(&self, document: &Html, record: &mut VacancyRecord) {
        if let Some(heading) = document.select(&self.school_name).next() {
            record.insert(keys::SCHOOL_NAME, element_text(heading));
        }
    }

    /// The numeric school id embedded in the first school-profile link.
    fn extract_school_id(&self, document: &Html, record: &mut VacancyRecord) {
        let href = document
            .select(&self.school_link)
            .next()
            .and_then(|link| link.value().attr("href"));

        if let Some(href) = href {
            if let Some(captures) = self.school_id_pattern.captures(href) {
                record.insert(keys::SCHOOL_ID, &captures[1]);
            }
        }
    }

    fn extract_job_title(&self, document: &Html, record: &mut VacancyRecord) {
        if let Some(heading) = document.select(&self.job_title).next() {
            record.insert(keys::JOB_TITLE, element_text(heading));
        }
    }

    /// Scans the address block's lines for the first "4 digits + 2 letters,
    /// then free text" line and splits it into postal code and place name.
    fn extract_address(&self, document: &Html, record: &mut VacancyRecord) {
        let Some(block) = document.select(&self.address_block).next() else {
            return;
        };

        for line in block.select(&self.address_line) {
            let content = element_text(line);
            if let Some(captures) = self.postal_pattern.captures(&content) {
                record.insert(keys::POSTAL_CODE, &captures[1]);
                record.insert(keys::PLACE_NAME, &captures[2]);
                break;
            }
        }
    }

    /// Latitude and longitude from the map link's `q=<lat>,<lon>` query.
    fn extract_coordinates(&self, document: &Html, record: &mut VacancyRecord) {
        let href = document
            .select(&self.map_link)
            .next()
            .and_then(|link| link.value().attr("href"));

        if let Some(href) = href {
            if let Some(captures) = self.coordinate_pattern.captures(href) {
                record.insert(keys::LATITUDE, &captures[1]);
                record.insert(keys::LONGITUDE, &captures[2]);
            }
        }
    }
}
