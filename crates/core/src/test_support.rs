use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use std::path::Path;

#[derive(Debug, Clone, Default)]
pub struct TestPage {
    text: Option<String>,
    form_text: Option<String>,
    rotation: Option<i64>,
    annotations: usize,
    image: bool,
}

impl TestPage {
    pub fn text(text: &str) -> Self {
        Self {
            text: Some(text.to_string()),
            ..Self::default()
        }
    }

    pub fn form(text: &str) -> Self {
        Self {
            form_text: Some(text.to_string()),
            ..Self::default()
        }
    }

    pub fn blank() -> Self {
        Self::default()
    }

    pub fn rotated(mut self, degrees: i64) -> Self {
        self.rotation = Some(degrees);
        self
    }

    pub fn with_annotations(mut self, count: usize) -> Self {
        self.annotations = count;
        self
    }

    pub fn with_image(mut self) -> Self {
        self.image = true;
        self
    }
}

pub fn write_pdf(path: &Path, pages: &[TestPage]) -> Result<(), Box<dyn std::error::Error>> {
    let mut document = Document::with_version("1.5");
    let pages_id = document.new_object_id();

    let font_id = document.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let image_id = document.add_object(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => 1,
            "Height" => 1,
            "ColorSpace" => "DeviceGray",
            "BitsPerComponent" => 8,
        },
        vec![0u8],
    ));
    let resources_id = document.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
        "XObject" => dictionary! { "Im1" => image_id },
    });

    let mut kids = Vec::new();
    for page in pages {
        let mut operations = Vec::new();
        if let Some(text) = &page.text {
            operations.extend(text_operations(text));
        }
        if page.image {
            operations.extend([
                Operation::new("q", vec![]),
                Operation::new("cm", vec![100.into(), 0.into(), 0.into(), 50.into(), 10.into(), 20.into()]),
                Operation::new("Do", vec!["Im1".into()]),
                Operation::new("Q", vec![]),
            ]);
        }

        let mut page_resources = None;
        if let Some(text) = &page.form_text {
            let form = Content {
                operations: text_operations(text),
            };
            let form_id = document.add_object(Stream::new(
                dictionary! {
                    "Type" => "XObject",
                    "Subtype" => "Form",
                    "BBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
                    "Resources" => dictionary! { "Font" => dictionary! { "F1" => font_id } },
                },
                form.encode()?,
            ));
            operations.push(Operation::new("Do", vec!["Fm1".into()]));
            page_resources = Some(document.add_object(dictionary! {
                "XObject" => dictionary! { "Fm1" => form_id },
            }));
        }

        let content = Content { operations };
        let content_id = document.add_object(Stream::new(dictionary! {}, content.encode()?));

        let mut page_dict = dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        };
        if let Some(resources) = page_resources {
            page_dict.set("Resources", resources);
        }
        if let Some(rotation) = page.rotation {
            page_dict.set("Rotate", rotation);
        }
        if page.annotations > 0 {
            let annotations: Vec<Object> = (0..page.annotations)
                .map(|index| {
                    let offset = 50 + 30 * index as i64;
                    Object::Dictionary(dictionary! {
                        "Type" => "Annot",
                        "Subtype" => "Text",
                        "Rect" => vec![offset.into(), offset.into(), (offset + 20).into(), (offset + 20).into()],
                    })
                })
                .collect();
            page_dict.set("Annots", annotations);
        }

        kids.push(Object::Reference(document.add_object(page_dict)));
    }

    let page_count = kids.len() as i64;
    document.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => page_count,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        }),
    );

    let catalog_id = document.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    let info_id = document.add_object(dictionary! {
        "Title" => Object::string_literal("Test Document"),
        "Producer" => Object::string_literal("docpipe tests"),
    });
    document.trailer.set("Root", catalog_id);
    document.trailer.set("Info", info_id);

    document.save(path)?;
    Ok(())
}

fn text_operations(text: &str) -> Vec<Operation> {
    vec![
        Operation::new("BT", vec![]),
        Operation::new("Tf", vec!["F1".into(), 24.into()]),
        Operation::new("Td", vec![72.into(), 700.into()]),
        Operation::new("Tj", vec![Object::string_literal(text)]),
        Operation::new("ET", vec![]),
    ]
}
