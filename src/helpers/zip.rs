//! Entry lookup inside OOXML packages.

use crate::error::ConvertError;
use crate::error::ResultOptionChain;
use crate::helpers::xml::XmlReader;
use std::io::BufReader;
use std::io::Read;
use std::io::Seek;
use zip::read::ZipFile;
use zip::result::ZipError;
use zip::ZipArchive;

pub(crate) trait ZipHelper<RS: Read + Seek> {
    /// Gets an entry by part name. Exact names are tried first; producers that
    /// write `XL/Media/Image1.PNG` or backslash separators are matched case-insensitively.
    fn file(&'_ mut self, name: &str) -> Result<Option<ZipFile<'_, RS>>, ConvertError>;

    fn xml_reader(
        &'_ mut self,
        name: &str,
    ) -> Result<Option<XmlReader<BufReader<ZipFile<'_, RS>>>>, ConvertError>;

    /// Reads a whole entry into memory (embedded pictures).
    fn read_bytes(&mut self, name: &str) -> Result<Option<Vec<u8>>, ConvertError>;
}

impl<RS: Read + Seek> ZipHelper<RS> for ZipArchive<RS> {
    fn file(&'_ mut self, name: &str) -> Result<Option<ZipFile<'_, RS>>, ConvertError> {
        let pattern = name.replace('\\', "/");
        let path = Ok::<_, ConvertError>(self.index_for_name(&pattern))
            .ok_none_else(|| {
                Ok(self
                    .file_names()
                    .position(|file_name| pattern.eq_ignore_ascii_case(&file_name.replace('\\', "/"))))
            })?;
        let Some(index) = path else {
            return Ok(None);
        };
        match self.by_index(index) {
            Ok(file) => Ok(Some(file)),
            Err(ZipError::FileNotFound) => Ok(None),
            Err(error) => Err(error)?,
        }
    }

    fn xml_reader(
        &'_ mut self,
        name: &str,
    ) -> Result<Option<XmlReader<BufReader<ZipFile<'_, RS>>>>, ConvertError> {
        let reader = self
            .file(name)?
            .map(|file| XmlReader::new(BufReader::new(file)));
        Ok(reader)
    }

    fn read_bytes(&mut self, name: &str) -> Result<Option<Vec<u8>>, ConvertError> {
        match self.file(name)? {
            Some(mut file) => {
                let mut bytes = Vec::with_capacity(file.size() as usize);
                file.read_to_end(&mut bytes)?;
                Ok(Some(bytes))
            }
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::io::Write;
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    fn archive(entries: &[(&str, &[u8])]) -> ZipArchive<Cursor<Vec<u8>>> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, content) in entries {
            writer.start_file(*name, SimpleFileOptions::default()).unwrap();
            writer.write_all(content).unwrap();
        }
        let cursor = writer.finish().unwrap();
        ZipArchive::new(cursor).unwrap()
    }

    #[test]
    fn file_lookup_ignores_case_and_separators() {
        let mut zip = archive(&[("xl/media/Image1.PNG", b"png")]);
        assert_eq!(zip.read_bytes("xl/media/Image1.PNG").unwrap().as_deref(), Some(&b"png"[..]));
        assert_eq!(zip.read_bytes("XL\\MEDIA\\image1.png").unwrap().as_deref(), Some(&b"png"[..]));
        assert!(zip.read_bytes("xl/media/image2.png").unwrap().is_none());
    }
}
