//! Picture anchors of a worksheet's drawing part (`xl/drawings/drawingN.xml`).

use crate::error::ConvertError;
use crate::helpers::xml::XmlNodeHelper;
use crate::helpers::xml::XmlTextContextHelper;
use crate::helpers::zip::ZipHelper;
use crate::match_xml_events;
use crate::spreadsheet::xlsx::load_relationships;
use crate::spreadsheet::xlsx::PackageReader;
use crate::spreadsheet::EmbeddedImage;
use quick_xml::events::Event;
use zip::ZipArchive;

const TAG_TWO_CELL_ANCHOR: &[u8] = b"twoCellAnchor";
const TAG_ONE_CELL_ANCHOR: &[u8] = b"oneCellAnchor";
const TAG_FROM: &[u8] = b"from";
const TAG_COL: &[u8] = b"col";
const TAG_ROW: &[u8] = b"row";
const TAG_PICTURE: &[u8] = b"pic";
const TAG_BLIP: &[u8] = b"blip";

const DRAWING_RELATIONSHIP: &str = "/drawing";
const IMAGE_RELATIONSHIP: &str = "/image";

#[derive(Default)]
struct Anchor {
    row: Option<usize>,
    col: Option<usize>,
    embed: Option<String>,
}

/// Pictures anchored on the worksheet stored in `sheet_part`, in drawing order.
pub(crate) fn load_sheet_images(
    zip: &mut ZipArchive<PackageReader>,
    sheet_part: &str,
) -> Result<Vec<EmbeddedImage>, ConvertError> {
    let mut drawings: Vec<String> = load_relationships(zip, sheet_part)?
        .into_values()
        .filter(|relationship| relationship.kind.ends_with(DRAWING_RELATIONSHIP))
        .map(|relationship| relationship.target)
        .collect();
    drawings.sort();

    let mut images = Vec::new();
    for drawing in drawings {
        images.extend(load_drawing_images(zip, &drawing)?);
    }
    Ok(images)
}

fn load_drawing_images(
    zip: &mut ZipArchive<PackageReader>,
    drawing_part: &str,
) -> Result<Vec<EmbeddedImage>, ConvertError> {
    let media = load_relationships(zip, drawing_part)?;
    let Some(mut reader) = zip.xml_reader(drawing_part)? else {
        return Ok(Vec::new());
    };

    let mut images = Vec::new();
    let mut anchor = None::<Anchor>;
    let mut in_from = false;
    let mut in_picture = false;
    let mut field = None::<&[u8]>;
    let mut text = String::new();
    match_xml_events!(reader => {
        Event::Start(event) if matches!(event.local_name().as_ref(), TAG_TWO_CELL_ANCHOR | TAG_ONE_CELL_ANCHOR) => {
            anchor = Some(Anchor::default());
        }
        Event::End(event) if matches!(event.local_name().as_ref(), TAG_TWO_CELL_ANCHOR | TAG_ONE_CELL_ANCHOR) => {
            if let Some(Anchor { row: Some(row), col: Some(col), embed: Some(embed) }) = anchor.take() {
                match media.get(&embed) {
                    Some(relationship) if relationship.kind.ends_with(IMAGE_RELATIONSHIP) => {
                        images.push(EmbeddedImage { row, col, part: relationship.target.to_owned() });
                    }
                    _ => tracing::debug!("{drawing_part}: picture relationship '{embed}' has no image target"),
                }
            }
        }
        Event::Start(event) if anchor.is_some() && event.local_name().as_ref() == TAG_FROM => in_from = true,
        Event::End(event) if event.local_name().as_ref() == TAG_FROM => in_from = false,
        Event::Start(event) if in_from && event.local_name().as_ref() == TAG_COL => {
            field = Some(TAG_COL);
            text.clear();
        }
        Event::Start(event) if in_from && event.local_name().as_ref() == TAG_ROW => {
            field = Some(TAG_ROW);
            text.clear();
        }
        Event::Text(event) if field.is_some() => text.push_bytes_text(&event)?,
        Event::End(event) if field.is_some() && matches!(event.local_name().as_ref(), TAG_COL | TAG_ROW) => {
            let index = text.trim().parse::<usize>()?;
            if let Some(anchor) = anchor.as_mut() {
                if field == Some(TAG_COL) {
                    anchor.col = Some(index);
                } else {
                    anchor.row = Some(index);
                }
            }
            field = None;
        }
        Event::Start(event) if anchor.is_some() && event.local_name().as_ref() == TAG_PICTURE => in_picture = true,
        Event::End(event) if event.local_name().as_ref() == TAG_PICTURE => in_picture = false,
        Event::Start(event) if in_picture && event.local_name().as_ref() == TAG_BLIP => {
            if let Some(anchor) = anchor.as_mut() {
                anchor.embed = event.get_local_attribute_value("embed")?.map(|embed| embed.to_string());
            }
        }
    });
    Ok(images)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spreadsheet::xlsx::XlsxSpreadsheet;
    use crate::spreadsheet::Spreadsheet;
    use rust_xlsxwriter::Image;
    use rust_xlsxwriter::Workbook;
    use tempfile::tempdir;

    #[test]
    fn images_are_anchored_to_their_top_left_cell() -> Result<(), ConvertError> {
        let dir = tempdir()?;
        let picture = dir.path().join("photo.png");
        image::RgbImage::new(4, 3).save(&picture)?;

        let path = dir.path().join("survey.xlsx");
        let mut workbook = Workbook::new();
        let worksheet = workbook.add_worksheet();
        worksheet.set_name("Rambu")?;
        worksheet.write_string(0, 0, "DOKUMENTASI")?;
        worksheet.insert_image(6, 3, &Image::new(&picture)?)?;
        worksheet.insert_image(8, 3, &Image::new(&picture)?)?;
        workbook.add_worksheet().set_name("Empty")?;
        workbook.save(&path)?;

        let mut spreadsheet = XlsxSpreadsheet::open(&path)?;
        let images = spreadsheet.sheet_images("Rambu")?;
        assert_eq!(images.len(), 2);
        assert_eq!((images[0].row, images[0].col), (6, 3));
        assert_eq!((images[1].row, images[1].col), (8, 3));
        assert!(images[0].part.starts_with("xl/media/"));

        let bytes = spreadsheet.image_data(&images[0])?;
        assert_eq!(&bytes[1..4], b"PNG");
        assert!(spreadsheet.sheet_images("Empty")?.is_empty());
        Ok(())
    }
}
