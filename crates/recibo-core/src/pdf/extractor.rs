//! PDF text and image extraction using lopdf and pdf-extract.

use image::{DynamicImage, ImageBuffer, Rgba};
use lopdf::{Document, Object, ObjectId};
use tracing::{debug, trace};

use crate::error::PdfError;

/// A loaded ticket PDF.
///
/// `lopdf` provides the object structure (pages, embedded images); the raw
/// bytes are kept for `pdf-extract`, which runs the content streams for the
/// native text path.
pub struct PdfDocument {
    document: Document,
    raw_data: Vec<u8>,
}

impl PdfDocument {
    /// Parse a PDF from memory.
    pub fn load(data: &[u8]) -> Result<Self, PdfError> {
        let mut document =
            Document::load_mem(data).map_err(|e| PdfError::Corrupt(e.to_string()))?;

        // Receipts downloaded from the store portal come encrypted with an
        // empty owner password; anything stronger is treated as corrupt.
        let raw_data = if document.is_encrypted() {
            if document.decrypt("").is_err() {
                return Err(PdfError::Corrupt("PDF cifrado".to_string()));
            }
            let mut decrypted = Vec::new();
            document
                .save_to(&mut decrypted)
                .map_err(|e| PdfError::Corrupt(e.to_string()))?;
            decrypted
        } else {
            data.to_vec()
        };

        if document.get_pages().is_empty() {
            return Err(PdfError::NoPages);
        }

        Ok(Self { document, raw_data })
    }

    pub fn page_count(&self) -> u32 {
        self.document.get_pages().len() as u32
    }

    /// Extract the native text, page by page, pages separated by a blank
    /// line. Returns `NoText` when no page yields anything, which sends the
    /// caller down the pdf-ocr path.
    pub fn extract_text(&self) -> Result<String, PdfError> {
        let pages = pdf_extract::extract_text_from_mem_by_pages(&self.raw_data)
            .map_err(|e| PdfError::Corrupt(e.to_string()))?;

        let non_empty: Vec<&str> = pages
            .iter()
            .map(|page| page.trim())
            .filter(|page| !page.is_empty())
            .collect();

        if non_empty.is_empty() {
            return Err(PdfError::NoText);
        }

        debug!(
            pages = pages.len(),
            with_text = non_empty.len(),
            "texto nativo extraído del PDF"
        );
        Ok(non_empty.join("\n\n"))
    }

    /// The bitmap of one page, for OCR.
    ///
    /// Scanned receipts embed the scan as the page's image XObject, so the
    /// page bitmap is the largest image reachable from the page resources; a
    /// document-wide scan covers files where the XObject is attached oddly.
    pub fn render_page(&self, page: u32) -> Result<DynamicImage, PdfError> {
        let images = self.page_images(page)?;
        if let Some(image) = images
            .into_iter()
            .max_by_key(|img| (img.width() as u64) * (img.height() as u64))
        {
            return Ok(image);
        }

        let mut all = self.all_images();
        let index = (page - 1) as usize;
        if index < all.len() {
            return Ok(all.swap_remove(index));
        }
        if let Some(first) = all.into_iter().next() {
            return Ok(first);
        }

        Err(PdfError::Corrupt(
            "la página no contiene ninguna imagen rasterizada".to_string(),
        ))
    }

    /// Embedded images reachable from one page's resources.
    fn page_images(&self, page: u32) -> Result<Vec<DynamicImage>, PdfError> {
        let pages = self.document.get_pages();
        let page_id = pages.get(&page).ok_or(PdfError::NoPages)?;

        let mut images = Vec::new();
        if let Some(resources) = self.page_resources(*page_id) {
            if let Ok(xobjects) = resources.get(b"XObject") {
                if let Ok((_, Object::Dictionary(xobj_dict))) =
                    self.document.dereference(xobjects)
                {
                    for (_name, obj_ref) in xobj_dict.iter() {
                        if let Ok((_, obj)) = self.document.dereference(obj_ref) {
                            if let Some(img) = self.decode_image_object(obj) {
                                images.push(img);
                            }
                        }
                    }
                }
            }
        }

        debug!(page, count = images.len(), "imágenes incrustadas en la página");
        Ok(images)
    }

    /// Every decodable image object in the document, in object order.
    fn all_images(&self) -> Vec<DynamicImage> {
        self.document
            .objects
            .values()
            .filter_map(|object| self.decode_image_object(object))
            .collect()
    }

    /// Resources dictionary for a page, following Parent inheritance.
    fn page_resources(&self, node_id: ObjectId) -> Option<lopdf::Dictionary> {
        let node = self.document.get_object(node_id).ok()?;
        let Object::Dictionary(dict) = node else {
            return None;
        };

        if let Ok(resources) = dict.get(b"Resources") {
            if let Ok((_, Object::Dictionary(res_dict))) = self.document.dereference(resources) {
                return Some(res_dict.clone());
            }
        }
        if let Ok(Object::Reference(parent_id)) = dict.get(b"Parent") {
            return self.page_resources(*parent_id);
        }
        None
    }

    fn decode_image_object(&self, obj: &Object) -> Option<DynamicImage> {
        let Object::Stream(stream) = obj else {
            return None;
        };
        let dict = &stream.dict;

        let subtype = dict.get(b"Subtype").ok()?;
        if subtype.as_name().ok()? != b"Image" {
            return None;
        }

        let width = dict.get(b"Width").ok()?.as_i64().ok()? as u32;
        let height = dict.get(b"Height").ok()?.as_i64().ok()? as u32;
        trace!(width, height, "objeto imagen encontrado");

        if let Ok(filter) = dict.get(b"Filter") {
            let filter_name = match filter {
                Object::Name(name) => Some(name.as_slice()),
                Object::Array(arr) => arr.first().and_then(|o| o.as_name().ok()),
                _ => None,
            };

            match filter_name {
                Some(b"DCTDecode") => {
                    // JPEG scan, stored as-is in the stream
                    return image::load_from_memory_with_format(
                        &stream.content,
                        image::ImageFormat::Jpeg,
                    )
                    .ok();
                }
                Some(b"JPXDecode") | Some(b"CCITTFaxDecode") | Some(b"JBIG2Decode") => {
                    trace!("filtro de imagen no soportado");
                    return None;
                }
                _ => {}
            }
        }

        let data = stream
            .decompressed_content()
            .unwrap_or_else(|_| stream.content.clone());

        let color_space = dict
            .get(b"ColorSpace")
            .ok()
            .and_then(|o| match o {
                Object::Name(name) => Some(name.as_slice()),
                Object::Array(arr) => arr.first().and_then(|o| o.as_name().ok()),
                Object::Reference(r) => self
                    .document
                    .get_object(*r)
                    .ok()
                    .and_then(|o| o.as_name().ok()),
                _ => None,
            })
            .unwrap_or(b"DeviceRGB");

        let bits = dict
            .get(b"BitsPerComponent")
            .ok()
            .and_then(|o| o.as_i64().ok())
            .unwrap_or(8);
        if bits != 8 {
            return None;
        }

        raw_to_image(&data, width, height, color_space)
    }
}

/// Build an image from an uncompressed sample buffer.
fn raw_to_image(
    data: &[u8],
    width: u32,
    height: u32,
    color_space: &[u8],
) -> Option<DynamicImage> {
    let pixels = (width as usize) * (height as usize);

    match color_space {
        b"DeviceRGB" | b"RGB" if data.len() >= pixels * 3 => {
            let mut rgba = Vec::with_capacity(pixels * 4);
            for chunk in data[..pixels * 3].chunks_exact(3) {
                rgba.extend_from_slice(chunk);
                rgba.push(255);
            }
            ImageBuffer::<Rgba<u8>, _>::from_raw(width, height, rgba)
                .map(DynamicImage::ImageRgba8)
        }
        b"DeviceGray" | b"G" if data.len() >= pixels => {
            let mut rgba = Vec::with_capacity(pixels * 4);
            for &gray in &data[..pixels] {
                rgba.extend_from_slice(&[gray, gray, gray, 255]);
            }
            ImageBuffer::<Rgba<u8>, _>::from_raw(width, height, rgba)
                .map(DynamicImage::ImageRgba8)
        }
        _ => {
            trace!(?color_space, "espacio de color no soportado");
            None
        }
    }
}
