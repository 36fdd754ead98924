use crate::error::ConvertError;
use crate::helpers::xml::XmlAttributeHelper;
use crate::helpers::xml::XmlNodeHelper;
use crate::helpers::xml::XmlReader;
use crate::helpers::xml::XmlTextContextHelper;
use crate::helpers::zip::ZipHelper;
use crate::match_xml_events;
use crate::spreadsheet::cell::CellValue;
use crate::spreadsheet::cell::NumberFormat;
use crate::spreadsheet::drawing;
use crate::spreadsheet::reference::reference_to_index;
use crate::spreadsheet::reference::MergedRange;
use crate::spreadsheet::sheet::RawSheet;
use crate::spreadsheet::EmbeddedImage;
use crate::spreadsheet::Spreadsheet;
use crate::spreadsheet::SpreadsheetError;
use quick_xml::events::Event;
use quick_xml::name::QName;
use std::borrow::Cow;
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::io::Read;
use std::io::Seek;
use std::io::SeekFrom;
use std::path::Path;
use zip::read::ZipFile;
use zip::ZipArchive;

const TAG_RELATIONSHIP: &[u8] = b"Relationship";
const TAG_CUSTOM_FORMATS: QName = QName(b"numFmts");
const TAG_CUSTOM_FORMAT: QName = QName(b"numFmt");
const TAG_FORMAT_INDEXES: QName = QName(b"cellXfs");
const TAG_FORMAT_INDEX: QName = QName(b"xf");
const TAG_SHARED_STRING_ITEM: QName = QName(b"si");
const TAG_PHONETIC_TEXT: QName = QName(b"rPh");
const TAG_TEXT: QName = QName(b"t");
const TAG_WORKBOOK_PROPERTIES: QName = QName(b"workbookPr");
const TAG_SHEET: QName = QName(b"sheet");
const TAG_ROW: QName = QName(b"row");
const TAG_CELL: QName = QName(b"c");
const TAG_INLINE_STRING: QName = QName(b"is");
const TAG_VALUE: QName = QName(b"v");
const TAG_MERGE_CELL: QName = QName(b"mergeCell");

/// OLE compound file signature; an `.xlsx` wrapped in one is an encrypted package.
const OLE_SIGNATURE: [u8; 8] = [0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];

pub(crate) type PackageReader = BufReader<File>;

/// Cell type attribute (`t`) of a worksheet `<c>` element.
#[derive(Copy, Clone, Debug, PartialEq)]
enum CellKind {
    Number,
    SharedString,
    InlineString,
    Boolean,
    Error,
    IsoDateTime,
}

/// One package relationship with its target resolved to a part name.
#[derive(Clone, Debug)]
pub(crate) struct Relationship {
    pub(crate) kind: String,
    pub(crate) target: String,
}

/// An open `.xlsx`/`.xlsm` package.
pub(crate) struct XlsxSpreadsheet {
    zip: ZipArchive<PackageReader>,
    number_formats: Vec<NumberFormat>,
    is_1904: bool,
    /// Worksheets as (name, part) pairs in workbook order
    sheets: Vec<(String, String)>,
    shared_strings: Option<Vec<String>>,
}

impl XlsxSpreadsheet {
    pub(crate) fn open(path: &Path) -> Result<XlsxSpreadsheet, ConvertError> {
        let name = path.display().to_string();
        let mut reader = BufReader::new(File::open(path)?);
        if is_password_protected(&mut reader)? {
            Err(SpreadsheetError::PasswordProtectedError(name.to_owned()))?;
        }

        let mut zip = ZipArchive::new(reader)?;
        let (sheets, is_1904) = load_workbook(&mut zip)?;
        if sheets.is_empty() {
            Err(SpreadsheetError::EmptyWorkbookError(name.to_owned()))?
        }
        let number_formats = load_number_formats(&mut zip)?;
        Ok(XlsxSpreadsheet {
            zip,
            number_formats,
            is_1904,
            sheets,
            shared_strings: None,
        })
    }

    fn sheet_part(&self, name: &str) -> Result<String, ConvertError> {
        self.sheets
            .iter()
            .find(|(sheet_name, _)| sheet_name == name)
            .map(|(_, part)| part.to_owned())
            .ok_or_else(|| SpreadsheetError::SheetNotFoundError(name.to_owned()).into())
    }
}

impl Spreadsheet for XlsxSpreadsheet {
    fn sheet_names(&self) -> Vec<String> {
        self.sheets.iter().map(|(name, _)| name.to_owned()).collect()
    }

    fn read_sheet(&mut self, name: &str) -> Result<RawSheet, ConvertError> {
        let part = self.sheet_part(name)?;
        if self.shared_strings.is_none() {
            self.shared_strings = Some(load_shared_strings(&mut self.zip)?);
        }

        let XlsxSpreadsheet { zip, number_formats, is_1904, shared_strings, .. } = self;
        let shared_strings = shared_strings.as_deref().unwrap_or_default();
        let mut reader = zip
            .xml_reader(&part)?
            .ok_or_else(|| SpreadsheetError::MissingPartError(part.to_owned()))?;

        let mut sheet = RawSheet::new(name);
        let mut next_row = 0usize;
        let mut next_col = 0usize;
        let mut row = 0usize;
        let mut col = 0usize;
        let mut kind = CellKind::Number;
        let mut style = None::<usize>;
        let mut value = String::new();
        let mut in_cell = false;
        match_xml_events!(reader => {
            Event::Start(event) if event.name() == TAG_ROW => {
                if let Some(number) = event.parse_attribute_value::<usize>("r")? {
                    next_row = number.saturating_sub(1);
                }
                next_col = 0;
            }
            Event::End(event) if event.name() == TAG_ROW => {
                next_row += 1;
            }
            Event::Start(event) if event.name() == TAG_CELL => {
                (row, col) = event.get_attribute_value("r")?
                    .and_then(|reference| reference_to_index(&reference))
                    .unwrap_or((next_row, next_col));
                next_col = col + 1;
                kind = match event.get_attribute_value("t")?.as_deref() {
                    Some("s") => CellKind::SharedString,
                    Some("inlineStr") | Some("str") => CellKind::InlineString,
                    Some("b") => CellKind::Boolean,
                    Some("e") => CellKind::Error,
                    Some("d") => CellKind::IsoDateTime,
                    _ => CellKind::Number,
                };
                style = event.parse_attribute_value::<usize>("s")?;
                value.clear();
                in_cell = true;
            }
            Event::Start(event) if in_cell && event.name() == TAG_INLINE_STRING => {
                value = read_string_value(&mut reader, TAG_INLINE_STRING, false)?;
            }
            Event::Start(event) if in_cell && event.name() == TAG_VALUE => {
                value = read_string_value(&mut reader, TAG_VALUE, true)?;
            }
            Event::End(event) if in_cell && event.name() == TAG_CELL => {
                in_cell = false;
                let format = style
                    .and_then(|index| number_formats.get(index))
                    .copied()
                    .unwrap_or_default();
                sheet.set(row, col, to_cell_value(kind, &value, format, *is_1904, shared_strings)?);
            }
            Event::Start(event) if event.name() == TAG_MERGE_CELL => {
                if let Some(range) = event.get_attribute_value("ref")?
                    .and_then(|reference| MergedRange::parse(&reference))
                {
                    sheet.add_merge(range);
                }
            }
        });
        Ok(sheet)
    }

    fn sheet_images(&mut self, name: &str) -> Result<Vec<EmbeddedImage>, ConvertError> {
        let part = self.sheet_part(name)?;
        drawing::load_sheet_images(&mut self.zip, &part)
    }

    fn image_data(&mut self, image: &EmbeddedImage) -> Result<Vec<u8>, ConvertError> {
        self.zip
            .read_bytes(&image.part)?
            .ok_or_else(|| SpreadsheetError::MissingPartError(image.part.to_owned()).into())
    }
}

fn to_cell_value(
    kind: CellKind,
    value: &str,
    format: NumberFormat,
    is_1904: bool,
    shared_strings: &[String],
) -> Result<CellValue, ConvertError> {
    if value.is_empty() {
        return Ok(CellValue::Empty);
    }
    let cell = match kind {
        CellKind::SharedString => {
            let index = value.trim().parse::<usize>()?;
            shared_strings
                .get(index)
                .map(|text| CellValue::Text(text.to_owned()))
                .unwrap_or_default()
        }
        CellKind::InlineString | CellKind::Error => CellValue::Text(value.to_owned()),
        CellKind::Boolean => CellValue::Bool(value.trim() == "1"),
        CellKind::IsoDateTime => CellValue::Text(value.replace('T', " ")),
        CellKind::Number => match value.trim().parse::<f64>() {
            Ok(number) => format
                .render(number, is_1904)
                .unwrap_or(CellValue::Number(number)),
            Err(_) => CellValue::Text(value.to_owned()),
        },
    };
    Ok(cell)
}

fn is_password_protected(reader: &mut PackageReader) -> Result<bool, ConvertError> {
    let mut signature = [0u8; 8];
    let protected = match reader.read_exact(&mut signature) {
        Ok(()) => signature == OLE_SIGNATURE,
        Err(_) => false,
    };
    reader.seek(SeekFrom::Start(0))?;
    Ok(protected)
}

/// Resolves a relationship target against the folder of the part that owns it.
pub(crate) fn resolve_target(base_dir: &str, target: &str) -> String {
    if let Some(absolute) = target.strip_prefix('/') {
        return absolute.to_owned();
    }
    let mut segments: Vec<&str> = base_dir.split('/').filter(|segment| !segment.is_empty()).collect();
    for segment in target.split('/') {
        match segment {
            "" | "." => (),
            ".." => {
                segments.pop();
            }
            segment => segments.push(segment),
        }
    }
    segments.join("/")
}

/// `xl/worksheets/sheet1.xml` -> (`xl/worksheets`, `xl/worksheets/_rels/sheet1.xml.rels`)
pub(crate) fn part_locations(part: &str) -> (String, String) {
    match part.rsplit_once('/') {
        Some((dir, file)) => (dir.to_owned(), format!("{dir}/_rels/{file}.rels")),
        None => (String::new(), format!("_rels/{part}.rels")),
    }
}

/// Loads the relationships of a part; a part without a `.rels` file has none.
pub(crate) fn load_relationships(
    zip: &mut ZipArchive<PackageReader>,
    part: &str,
) -> Result<HashMap<String, Relationship>, ConvertError> {
    let (base_dir, rels_path) = part_locations(part);
    let mut relationships = HashMap::new();
    let Some(mut reader) = zip.xml_reader(&rels_path)? else {
        return Ok(relationships);
    };
    match_xml_events!(reader => {
        Event::Start(event) if event.local_name().as_ref() == TAG_RELATIONSHIP => {
            let id = event.get_attribute_value("Id")?;
            let kind = event.get_attribute_value("Type")?.unwrap_or_default();
            let external = event.get_attribute_value("TargetMode")?
                .map(|mode| mode.eq_ignore_ascii_case("External"))
                .unwrap_or(false);
            if let Some((id, target)) = id.zip(event.get_attribute_value("Target")?) {
                if !external {
                    relationships.insert(id.to_string(), Relationship {
                        kind: kind.to_string(),
                        target: resolve_target(&base_dir, &target),
                    });
                }
            }
        }
    });
    Ok(relationships)
}

/// Worksheet (name, part) pairs in workbook order plus the 1904 date-system flag.
fn load_workbook(zip: &mut ZipArchive<PackageReader>) -> Result<(Vec<(String, String)>, bool), ConvertError> {
    let relationships = load_relationships(zip, "xl/workbook.xml")?;
    let mut reader = zip.xml_reader("xl/workbook.xml")?
        .ok_or_else(|| SpreadsheetError::MissingPartError("xl/workbook.xml".to_string()))?;
    let mut sheets: Vec<(String, String)> = Vec::new();
    let mut is_1904 = false;
    match_xml_events!(reader => {
        Event::Start(event) if event.name() == TAG_SHEET => {
            let mut name = None::<Cow<str>>;
            let mut id = None::<Cow<str>>;
            for result in event.attributes() {
                let attribute = result?;
                let key = attribute.key.local_name();
                if key.as_ref() == b"name" {
                    name = Some(attribute.get_value()?);
                } else if key.as_ref() == b"id" {
                    id = Some(attribute.get_value()?);
                }
            }
            if let Some((name, id)) = name.zip(id) {
                if let Some(relationship) = relationships.get(id.as_ref()) {
                    if relationship.kind.ends_with("/worksheet") {
                        sheets.push((name.to_string(), relationship.target.to_owned()));
                    }
                }
            }
        }
        Event::Start(event) if event.name() == TAG_WORKBOOK_PROPERTIES => {
            is_1904 = event.get_attribute_value("date1904")?
                .map(|value| value == "1" || value == "true")
                .unwrap_or(false);
        }
    });
    Ok((sheets, is_1904))
}

/// Reads every `<si>` item of the shared string table.
fn load_shared_strings(zip: &mut ZipArchive<PackageReader>) -> Result<Vec<String>, ConvertError> {
    let mut shared_strings = Vec::<String>::new();
    let Some(mut reader) = zip.xml_reader("xl/sharedStrings.xml")? else {
        return Ok(shared_strings);
    };
    match_xml_events!(reader => {
        Event::Start(event) if event.name() == TAG_SHARED_STRING_ITEM => {
            shared_strings.push(read_string_value(&mut reader, TAG_SHARED_STRING_ITEM, false)?);
        }
    });
    Ok(shared_strings)
}

/// Number format of every cell style (`cellXfs`), in style index order.
fn load_number_formats(zip: &mut ZipArchive<PackageReader>) -> Result<Vec<NumberFormat>, ConvertError> {
    let Some(mut reader) = zip.xml_reader("xl/styles.xml")? else {
        return Ok(Vec::new());
    };

    let mut custom_formats_context = false;
    let mut custom_formats = HashMap::<String, NumberFormat>::new();
    let mut format_indexes_context = false;
    let mut format_indexes = Vec::<String>::new();

    match_xml_events!(reader => {
        Event::Start(event) if event.name() == TAG_CUSTOM_FORMATS => custom_formats_context = true,
        Event::End(event) if event.name() == TAG_CUSTOM_FORMATS => custom_formats_context = false,
        Event::Start(event) if custom_formats_context && event.name() == TAG_CUSTOM_FORMAT => {
            let id = event.get_attribute_value("numFmtId")?;
            let format = event.get_attribute_value("formatCode")?;
            if let Some((id, format)) = id.zip(format) {
                custom_formats.insert(id.to_string(), NumberFormat::parse_custom_number_format(&format));
            }
        }
        Event::Start(event) if event.name() == TAG_FORMAT_INDEXES => format_indexes_context = true,
        Event::End(event) if event.name() == TAG_FORMAT_INDEXES => format_indexes_context = false,
        Event::Start(event) if format_indexes_context && event.name() == TAG_FORMAT_INDEX => {
            format_indexes.push(event.get_attribute_value("numFmtId")?.unwrap_or_default().to_string());
        }
    });

    Ok(format_indexes
        .iter()
        .map(|id| {
            custom_formats
                .get(id)
                .copied()
                .or_else(|| NumberFormat::parse_builtin_number_format_id(id))
                .unwrap_or_default()
        })
        .collect())
}

/// Collects the text of a string element, skipping phonetic runs.
fn read_string_value(
    reader: &mut XmlReader<BufReader<ZipFile<'_, PackageReader>>>,
    end_tag: QName,
    is_text_content: bool,
) -> Result<String, ConvertError> {
    let mut is_phonetic_text = false;
    let mut is_text = is_text_content;
    let mut text = String::new();
    match_xml_events!(reader => {
        Event::End(event) if event.name() == end_tag => break,
        Event::Start(event) if event.name() == TAG_PHONETIC_TEXT => is_phonetic_text = true,
        Event::End(event) if event.name() == TAG_PHONETIC_TEXT => is_phonetic_text = false,
        Event::Start(event) if !is_phonetic_text && event.name() == TAG_TEXT => is_text = true,
        Event::End(event) if is_text && event.name() == TAG_TEXT => is_text = false,
        Event::Text(event) if is_text => text.push_bytes_text(&event)?,
        Event::CData(event) if is_text => text.push_str(&event.xml_content()?),
        Event::GeneralRef(event) if is_text => text.push_bytes_ref(&event)?,
    });
    Ok(text)
}
