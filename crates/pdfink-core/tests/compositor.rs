//! End-to-end compositor tests
//!
//! Each test builds a small PDF, renders annotations onto it, and re-parses
//! the output to check what ended up on the page.

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};
use pdfink_core::{
    render, Annotation, AnnotationList, Compositor, FaultPolicy, PdfInkError, PixelFormat,
    RenderOptions,
};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

/// Create a test PDF with `sizes.len()` pages, each carrying a little
/// original text drawn with its own font resource
fn create_test_pdf(sizes: &[(i64, i64)]) -> Vec<u8> {
    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });

    let mut kids = Vec::new();
    for (i, (width, height)) in sizes.iter().enumerate() {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new(
                    "Tf",
                    vec![Object::Name(b"F1".to_vec()), Object::Integer(12)],
                ),
                Operation::new("Td", vec![Object::Integer(5), Object::Integer(5)]),
                Operation::new(
                    "Tj",
                    vec![Object::String(
                        format!("Original {}", i + 1).into_bytes(),
                        lopdf::StringFormat::Literal,
                    )],
                ),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(Dictionary::new(), content.encode().unwrap()));

        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), (*width).into(), (*height).into()],
            "Contents" => content_id,
            "Resources" => dictionary! {
                "Font" => dictionary! { "F1" => font_id },
            },
        });
        kids.push(Object::Reference(page_id));
    }

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Count" => sizes.len() as i64,
            "Kids" => kids,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer).unwrap();
    buffer
}

fn page_id(doc: &Document, index: usize) -> ObjectId {
    doc.get_pages().into_values().nth(index).unwrap()
}

fn operations(doc: &Document, index: usize) -> Vec<Operation> {
    let content = doc.get_page_content(page_id(doc, index)).unwrap();
    Content::decode(&content).unwrap().operations
}

fn numbers(operation: &Operation) -> Vec<f64> {
    operation
        .operands
        .iter()
        .filter_map(|o| match o {
            Object::Integer(i) => Some(*i as f64),
            Object::Real(r) => Some(*r as f64),
            _ => None,
        })
        .collect()
}

fn find<'a>(ops: &'a [Operation], operator: &str) -> &'a Operation {
    ops.iter()
        .find(|o| o.operator == operator)
        .unwrap_or_else(|| panic!("no {} operator", operator))
}

fn ascending(indices: &[usize]) -> bool {
    indices.windows(2).all(|pair| pair[0] < pair[1])
}

fn position(ops: &[Operation], operator: &str) -> usize {
    ops.iter().position(|o| o.operator == operator).unwrap()
}

fn resource<'a>(doc: &'a Document, index: usize, category: &[u8], name: &[u8]) -> &'a Object {
    let page = doc.get_dictionary(page_id(doc, index)).unwrap();
    let resources = match page.get(b"Resources").unwrap() {
        Object::Reference(id) => doc.get_dictionary(*id).unwrap(),
        obj => obj.as_dict().unwrap(),
    };
    let category = match resources.get(category).unwrap() {
        Object::Reference(id) => doc.get_dictionary(*id).unwrap(),
        obj => obj.as_dict().unwrap(),
    };
    match category.get(name).unwrap() {
        Object::Reference(id) => doc.get_object(*id).unwrap(),
        obj => obj,
    }
}

fn text(page: u32, content: &str, x: f64, y: f64) -> Annotation {
    Annotation::Text {
        page,
        content: content.to_string(),
        font: "Helvetica".to_string(),
        size_pt: 14.0,
        color: "#000000".to_string(),
        x,
        y,
    }
}

fn rectangle(page: u32, opacity: f64) -> Annotation {
    Annotation::Rectangle {
        page,
        x: 20.0,
        y: 30.0,
        width: 40.0,
        height: 10.0,
        fill: "#00ff00".to_string(),
        stroke: "#000000".to_string(),
        opacity,
        stroke_width_pt: 1.0,
    }
}

#[test]
fn test_text_lands_at_flipped_coordinates() {
    let pdf = create_test_pdf(&[(200, 300)]);
    let list = AnnotationList::from(vec![text(0, "Hi", 10.0, 20.0)]);

    let output = render(&pdf, &list).unwrap();
    let doc = Document::load_mem(&output).unwrap();
    let ops = operations(&doc, 0);

    // The original text comes first, then the overlay's
    let tds: Vec<_> = ops.iter().filter(|o| o.operator == "Td").collect();
    assert_eq!(tds.len(), 2);
    assert_eq!(numbers(tds[1]), vec![10.0, 280.0]);

    let tfs: Vec<_> = ops.iter().filter(|o| o.operator == "Tf").collect();
    assert_eq!(numbers(tfs[1]), vec![14.0]);
    let font_name = match &tfs[1].operands[0] {
        Object::Name(name) => name.clone(),
        other => panic!("Tf operand {:?}", other),
    };

    let tjs: Vec<_> = ops.iter().filter(|o| o.operator == "Tj").collect();
    assert!(matches!(&tjs[1].operands[0], Object::String(bytes, _) if bytes == b"Hi"));

    let font = resource(&doc, 0, b"Font", &font_name).as_dict().unwrap();
    assert!(matches!(font.get(b"BaseFont"), Ok(Object::Name(n)) if n == b"Helvetica"));
    assert!(matches!(font.get(b"Encoding"), Ok(Object::Name(n)) if n == b"WinAnsiEncoding"));
}

#[test]
fn test_existing_font_resource_survives() {
    let pdf = create_test_pdf(&[(200, 300)]);
    let list = AnnotationList::from(vec![text(0, "Hi", 10.0, 20.0)]);
    let output = render(&pdf, &list).unwrap();
    let doc = Document::load_mem(&output).unwrap();

    let original = resource(&doc, 0, b"Font", b"F1").as_dict().unwrap();
    assert!(matches!(original.get(b"BaseFont"), Ok(Object::Name(n)) if n == b"Courier"));
}

#[test]
fn test_empty_list_is_a_no_op() {
    let pdf = create_test_pdf(&[(612, 792), (612, 792)]);
    let output = render(&pdf, &AnnotationList::new()).unwrap();
    assert_eq!(output, pdf);
}

#[test]
fn test_later_records_draw_later() {
    let pdf = create_test_pdf(&[(200, 300)]);
    let list = AnnotationList::from(vec![rectangle(0, 1.0), text(0, "top", 0.0, 50.0)]);
    let output = render(&pdf, &list).unwrap();
    let doc = Document::load_mem(&output).unwrap();
    let ops = operations(&doc, 0);

    let rect_at = position(&ops, "re");
    let last_tj = ops.iter().rposition(|o| o.operator == "Tj").unwrap();
    assert!(rect_at < last_tj);

    // Rectangle corner: (20, 300 - 30 - 10)
    assert_eq!(numbers(find(&ops, "re")), vec![20.0, 260.0, 40.0, 10.0]);
}

#[test]
fn test_later_rectangle_covers_earlier_one() {
    let pdf = create_test_pdf(&[(200, 300)]);
    let mut first = rectangle(0, 1.0);
    let mut second = rectangle(0, 1.0);
    if let Annotation::Rectangle { fill, .. } = &mut first {
        *fill = "#ff0000".to_string();
    }
    if let Annotation::Rectangle { x, y, fill, .. } = &mut second {
        *x = 30.0;
        *y = 35.0;
        *fill = "#0000ff".to_string();
    }
    let list = AnnotationList::from(vec![first, second]);
    let output = render(&pdf, &list).unwrap();
    let doc = Document::load_mem(&output).unwrap();
    let ops = operations(&doc, 0);

    let rects: Vec<usize> = ops
        .iter()
        .enumerate()
        .filter(|(_, o)| o.operator == "re")
        .map(|(i, _)| i)
        .collect();
    assert_eq!(rects.len(), 2);
    assert_eq!(numbers(&ops[rects[0]]), vec![20.0, 260.0, 40.0, 10.0]);
    assert_eq!(numbers(&ops[rects[1]]), vec![30.0, 255.0, 40.0, 10.0]);

    // Each fill colour is set before its own path, and B is painted after A
    let fills: Vec<usize> = ops
        .iter()
        .enumerate()
        .filter(|(_, o)| o.operator == "rg")
        .map(|(i, _)| i)
        .collect();
    assert_eq!(numbers(&ops[fills[0]]), vec![1.0, 0.0, 0.0]);
    assert_eq!(numbers(&ops[fills[1]]), vec![0.0, 0.0, 1.0]);
    assert!(ascending(&[fills[0], rects[0], fills[1], rects[1]]));

    let paints: Vec<usize> = ops
        .iter()
        .enumerate()
        .filter(|(_, o)| o.operator == "B")
        .map(|(i, _)| i)
        .collect();
    assert_eq!(paints.len(), 2);
    assert!(ascending(&[rects[0], paints[0], rects[1], paints[1]]));
}

#[test]
fn test_other_pages_are_untouched() {
    let pdf = create_test_pdf(&[(612, 792); 4]);
    let before = Document::load_mem(&pdf).unwrap();

    let list = AnnotationList::from(vec![text(2, "only here", 50.0, 50.0)]);
    let output = render(&pdf, &list).unwrap();
    let after = Document::load_mem(&output).unwrap();

    assert_eq!(after.get_pages().len(), 4);
    for index in [0, 1, 3] {
        let old_page = before.get_dictionary(page_id(&before, index)).unwrap();
        let new_page = after.get_dictionary(page_id(&after, index)).unwrap();
        assert_eq!(
            after.get_page_content(page_id(&after, index)).unwrap(),
            before.get_page_content(page_id(&before, index)).unwrap()
        );
        assert_eq!(
            format!("{:?}", new_page.get(b"Resources").unwrap()),
            format!("{:?}", old_page.get(b"Resources").unwrap())
        );
    }

    let annotated = operations(&after, 2);
    assert_eq!(annotated.iter().filter(|o| o.operator == "Tj").count(), 2);
}

#[test]
fn test_freeform_layer_covers_page() {
    let pdf = create_test_pdf(&[(100, 100)]);
    let mut pixels = vec![0u8; 400 * 400 * 4];
    // One opaque red pixel in the top-left corner
    pixels[..4].copy_from_slice(&[255, 0, 0, 255]);
    let list = AnnotationList::from(vec![Annotation::FreeformImage {
        page: 0,
        pixel_buffer: pixels,
        source_width_px: 400,
        source_height_px: 400,
        format: PixelFormat::Rgba,
    }]);

    let output = render(&pdf, &list).unwrap();
    let doc = Document::load_mem(&output).unwrap();
    let ops = operations(&doc, 0);

    let placement = ops
        .iter()
        .filter(|o| o.operator == "cm")
        .map(numbers)
        .find(|n| n == &vec![100.0, 0.0, 0.0, 100.0, 0.0, 0.0]);
    assert!(placement.is_some());

    let image_name = match &find(&ops, "Do").operands[0] {
        Object::Name(name) => name.clone(),
        other => panic!("Do operand {:?}", other),
    };
    let image = resource(&doc, 0, b"XObject", &image_name)
        .as_stream()
        .unwrap();
    assert!(matches!(image.dict.get(b"Width"), Ok(Object::Integer(400))));
    assert!(matches!(
        image.dict.get(b"Height"),
        Ok(Object::Integer(400))
    ));
    assert!(image.dict.get(b"SMask").is_ok());
}

#[test]
fn test_png_drawing_is_decoded_onto_page() {
    let mut png_bytes = Vec::new();
    {
        let mut encoder = png::Encoder::new(&mut png_bytes, 3, 2);
        encoder.set_color(png::ColorType::Rgba);
        encoder.set_depth(png::BitDepth::Eight);
        let mut writer = encoder.write_header().unwrap();
        writer.write_image_data(&[200; 3 * 2 * 4]).unwrap();
    }
    let pdf = create_test_pdf(&[(100, 100)]);
    let list = AnnotationList::from(vec![Annotation::FreeformImage {
        page: 0,
        pixel_buffer: png_bytes,
        source_width_px: 3,
        source_height_px: 2,
        format: PixelFormat::Png,
    }]);

    let output = render(&pdf, &list).unwrap();
    let doc = Document::load_mem(&output).unwrap();
    let ops = operations(&doc, 0);
    let image_name = match &find(&ops, "Do").operands[0] {
        Object::Name(name) => name.clone(),
        other => panic!("Do operand {:?}", other),
    };
    let image = resource(&doc, 0, b"XObject", &image_name)
        .as_stream()
        .unwrap();
    assert!(matches!(image.dict.get(b"Width"), Ok(Object::Integer(3))));
    assert!(matches!(image.dict.get(b"Height"), Ok(Object::Integer(2))));
}

#[test]
fn test_oversized_drawing_is_an_invalid_record() {
    let pdf = create_test_pdf(&[(100, 100)]);
    let list = AnnotationList::from(vec![Annotation::FreeformImage {
        page: 0,
        pixel_buffer: vec![0; 4],
        source_width_px: u32::MAX,
        source_height_px: u32::MAX,
        format: PixelFormat::Rgba,
    }]);

    let err = render(&pdf, &list).unwrap_err();
    assert!(matches!(err, PdfInkError::InvalidRecord { index: 0, .. }));

    let skip = Compositor::new(RenderOptions {
        fault_policy: FaultPolicy::Skip,
        ..Default::default()
    });
    let report = skip.render_with_report(&pdf, &list).unwrap();
    assert_eq!((report.drawn, report.skipped), (0, 1));
    assert_eq!(report.pdf, pdf);
}

#[test]
fn test_translucent_shapes_use_ext_gstate() {
    let pdf = create_test_pdf(&[(200, 300)]);
    let list = AnnotationList::from(vec![rectangle(0, 0.5)]);
    let output = render(&pdf, &list).unwrap();
    let doc = Document::load_mem(&output).unwrap();
    let ops = operations(&doc, 0);

    let state_name = match &find(&ops, "gs").operands[0] {
        Object::Name(name) => name.clone(),
        other => panic!("gs operand {:?}", other),
    };
    let state = resource(&doc, 0, b"ExtGState", &state_name)
        .as_dict()
        .unwrap();
    assert!(matches!(state.get(b"ca"), Ok(Object::Real(a)) if (*a - 0.5).abs() < 1e-6));
    assert!(matches!(state.get(b"CA"), Ok(Object::Real(a)) if (*a - 0.5).abs() < 1e-6));
}

#[test]
fn test_malformed_source_is_rejected() {
    let list = AnnotationList::from(vec![text(0, "x", 0.0, 0.0)]);
    let err = render(b"%PDF-1.7 this is not really a pdf", &list).unwrap_err();
    assert!(matches!(err, PdfInkError::MalformedInput(_)));
}

#[test]
fn test_abort_and_skip_policies() {
    let pdf = create_test_pdf(&[(200, 300)]);
    let mut bad = text(0, "bad", 0.0, 0.0);
    if let Annotation::Text { color, .. } = &mut bad {
        *color = "#zzzzzz".to_string();
    }
    let list = AnnotationList::from(vec![text(0, "good", 0.0, 10.0), bad]);

    let err = render(&pdf, &list).unwrap_err();
    assert!(matches!(err, PdfInkError::InvalidRecord { index: 1, .. }));

    let skip = Compositor::new(RenderOptions {
        fault_policy: FaultPolicy::Skip,
        ..Default::default()
    });
    let report = skip.render_with_report(&pdf, &list).unwrap();
    assert_eq!((report.drawn, report.skipped), (1, 1));

    let doc = Document::load_mem(&report.pdf).unwrap();
    let ops = operations(&doc, 0);
    assert_eq!(ops.iter().filter(|o| o.operator == "Tj").count(), 2);
}

#[test]
fn test_records_past_the_last_page_are_ignored() {
    let pdf = create_test_pdf(&[(200, 300), (200, 300)]);
    let list = AnnotationList::from(vec![
        text(1, "kept", 0.0, 0.0),
        text(7, "lost", 0.0, 0.0),
    ]);
    let report = Compositor::default().render_with_report(&pdf, &list).unwrap();
    assert_eq!(report.off_document, 1);
    assert_eq!(report.drawn, 1);
    let doc = Document::load_mem(&report.pdf).unwrap();
    assert_eq!(doc.get_pages().len(), 2);
}

fn arb_annotation(max_page: u32) -> impl Strategy<Value = Annotation> {
    prop_oneof![
        (0..max_page + 2, 0.0..600.0f64, 0.0..800.0f64)
            .prop_map(|(page, x, y)| text(page, "p", x, y)),
        (0..max_page + 2, 0.0..1.0f64).prop_map(|(page, opacity)| rectangle(page, opacity)),
        (0..max_page + 2, 0.0..300.0f64).prop_map(|(page, radius)| Annotation::Circle {
            page,
            center_x: 100.0,
            center_y: 100.0,
            radius,
            fill: "#123456".to_string(),
            stroke: "#abc".to_string(),
            opacity: 1.0,
            stroke_width_pt: 0.0,
        }),
        (0..max_page + 2, 0.0..5.0f64).prop_map(|(page, width_pt)| Annotation::Line {
            page,
            x1: 0.0,
            y1: 0.0,
            x2: 30.0,
            y2: 40.0,
            color: "#ff00ff".to_string(),
            width_pt,
        }),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    /// Rendering never adds or removes pages
    #[test]
    fn prop_page_count_preserved(
        page_count in 1usize..5,
        annotations in prop::collection::vec(arb_annotation(4), 0..8),
    ) {
        let pdf = create_test_pdf(&vec![(300, 400); page_count]);
        let list = AnnotationList::from(annotations);
        let output = render(&pdf, &list).unwrap();
        let doc = Document::load_mem(&output).unwrap();
        prop_assert_eq!(doc.get_pages().len(), page_count);
    }
}
