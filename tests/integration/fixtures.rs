//! On-disk book directories for pipeline tests

use std::{fs::File, io::Write, path::PathBuf};

use tempfile::TempDir;

const JP2_SIGNATURE: [u8; 12] = [0x00, 0x00, 0x00, 0x0C, b'j', b'P', b' ', b' ', 0x0D, 0x0A, 0x87, 0x0A];

fn jp2_box(kind: &[u8; 4], body: &[u8]) -> Vec<u8> {
    let mut out = ((body.len() + 8) as u32).to_be_bytes().to_vec();
    out.extend_from_slice(kind);
    out.extend_from_slice(body);
    out
}

/// Header-only JP2 file of the given size
pub fn jp2(width: u32, height: u32) -> Vec<u8> {
    let mut ihdr = height.to_be_bytes().to_vec();
    ihdr.extend_from_slice(&width.to_be_bytes());
    ihdr.extend_from_slice(&[0, 3, 7, 7, 0, 0]);

    let mut bytes = JP2_SIGNATURE.to_vec();
    bytes.extend(jp2_box(b"ftyp", b"jp2 \0\0\0\0jp2 "));
    bytes.extend(jp2_box(b"jp2h", &jp2_box(b"ihdr", &ihdr)));
    bytes
}

pub fn work_xml(access: &str, license: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<work:work xmlns:work="http://www.tbrc.org/models/work#" RID="W22084" status="released">
  <work:archiveInfo access="{}" license="{}" status="done" vols="1"/>
</work:work>"#,
        access, license
    )
}

pub fn marc_xml(access_note: &str, publisher: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<record xmlns="http://www.loc.gov/MARC21/slim">
  <leader>     nam a22     4i 4500</leader>
  <datafield tag="245" ind1="0" ind2="0"><subfield code="a">rgyud sde kun btus</subfield></datafield>
  <datafield tag="264" ind1=" " ind2="1"><subfield code="b">{}</subfield></datafield>
  <datafield tag="506" ind1="1" ind2=" "><subfield code="a">{}</subfield></datafield>
</record>"#,
        publisher, access_note
    )
}

/// A book directory named after its identifier
pub struct BookDir {
    _root: TempDir,
    pub path: PathBuf,
    pub identifier: String,
    pub book_id: String,
}

impl BookDir {
    pub fn new(identifier: &str) -> Self {
        let root = tempfile::tempdir().unwrap();
        let path = root.path().join(identifier);
        std::fs::create_dir_all(path.join("meta")).unwrap();
        Self {
            _root: root,
            path,
            identifier: identifier.to_string(),
            book_id: identifier.trim_start_matches("bdrc-").to_string(),
        }
    }

    pub fn with_work(self, xml: &str) -> Self {
        std::fs::write(self.path.join("meta").join(format!("{}.xml", self.book_id)), xml).unwrap();
        self
    }

    pub fn with_marc(self, xml: &str) -> Self {
        std::fs::write(self.path.join("meta").join(format!("marc-{}.xml", self.book_id)), xml).unwrap();
        self
    }

    pub fn with_record(self, json: &str) -> Self {
        std::fs::write(self.path.join(format!("{}.json", self.book_id)), json).unwrap();
        self
    }

    /// `count` images of `width`x`height` packaged as `<identifier>_jp2.zip`
    pub fn with_images(self, count: usize, width: u32, height: u32) -> Self {
        let file = File::create(self.path.join(format!("{}_jp2.zip", self.identifier))).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        let options = zip::write::FileOptions::default().compression_method(zip::CompressionMethod::Stored);
        for index in 0..count {
            zip.start_file(
                format!("{0}_jp2/{0}_{1:04}.jp2", self.identifier, index),
                options,
            )
            .unwrap();
            zip.write_all(&jp2(width, height)).unwrap();
        }
        zip.finish().unwrap();
        self
    }

    pub fn meta_xml(&self) -> PathBuf {
        self.path.join(format!("{}_meta.xml", self.identifier))
    }
}
