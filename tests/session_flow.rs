//! # Session Flow Tests
//!
//! End-to-end runs through the library API with in-process stand-ins for the
//! description and generation services: upload, drop, drag, harmonize, undo.

use async_trait::async_trait;
use image::{DynamicImage, GenericImageView, ImageFormat, Rgba, RgbaImage};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use roomstage::catalog::ProductId;
use roomstage::harmonize::Harmonizer;
use roomstage::interaction::{DragMode, InteractionController};
use roomstage::media::ImageData;
use roomstage::placement::{Point, Size};
use roomstage::service::{ContentPart, DescriptionService, GenerationRequest, GenerationService};
use roomstage::session::{Session, SessionState};
use roomstage::RoomstageError;

// ============================================================================
// HELPERS
// ============================================================================

fn png(width: u32, height: u32, color: [u8; 4]) -> ImageData {
    let img = RgbaImage::from_pixel(width, height, Rgba(color));
    ImageData::encode(&DynamicImage::ImageRgba8(img), ImageFormat::Png).unwrap()
}

/// Describes every product by its pixel width; fails on one chosen width.
struct WidthDescriber {
    calls: AtomicUsize,
    fail_width: Option<u32>,
}

#[async_trait]
impl DescriptionService for WidthDescriber {
    async fn describe(
        &self,
        image: &ImageData,
        _instruction: &str,
    ) -> Result<String, RoomstageError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let (w, _) = image.dimensions().unwrap();
        if Some(w) == self.fail_width {
            return Err(RoomstageError::Service("HTTP 500".to_string()));
        }
        Ok(format!("a {} pixel wide box", w))
    }
}

/// Records every request and answers with a fixed image.
struct RecordingGenerator {
    requests: Mutex<Vec<GenerationRequest>>,
    reply: ImageData,
}

impl RecordingGenerator {
    fn new(reply: ImageData) -> Arc<Self> {
        Arc::new(Self {
            requests: Mutex::new(Vec::new()),
            reply,
        })
    }

    fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl GenerationService for RecordingGenerator {
    async fn generate(
        &self,
        request: GenerationRequest,
    ) -> Result<Vec<ContentPart>, RoomstageError> {
        self.requests.lock().unwrap().push(request);
        Ok(vec![
            ContentPart::Text("Here you go".to_string()),
            ContentPart::InlineData(self.reply.clone()),
        ])
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[tokio::test]
async fn test_drop_resize_harmonize_undo() {
    let describer = Arc::new(WidthDescriber {
        calls: AtomicUsize::new(0),
        fail_width: None,
    });
    let harmonized = png(400, 300, [90, 80, 70, 255]);
    let generator = RecordingGenerator::new(harmonized.clone());
    let harmonizer = Harmonizer::new(generator.clone());

    let mut session = Session::new();
    let room = png(800, 600, [255, 255, 255, 255]);
    session.load_room(room.clone()).unwrap();
    session.set_display_size(Size::new(400.0, 300.0)).unwrap();

    let products = session
        .ingest_products(describer.clone(), vec![png(300, 200, [200, 0, 0, 255])])
        .await
        .unwrap();
    assert_eq!(products, vec![ProductId(0)]);
    assert_eq!(session.catalog().entries()[0].description, "a 300 pixel wide box");

    let id = session
        .add_placement(products[0], Point::new(100.0, 100.0))
        .unwrap()
        .unwrap();
    assert_eq!(session.state(), SessionState::Placing);

    // Drag the resize handle 50 units right; the height follows 3:2.
    let mut controller = InteractionController::new();
    assert!(
        controller
            .pointer_down(&mut session, id, DragMode::Resize, Point::new(170.0, 145.0))
            .unwrap()
    );
    controller
        .pointer_move(&mut session, Point::new(200.0, 160.0))
        .unwrap();
    controller
        .pointer_move(&mut session, Point::new(220.0, 170.0))
        .unwrap();
    controller.pointer_up();

    let placement = session.placement(id).unwrap();
    assert!((placement.size.width - 200.0).abs() < 1e-9);
    assert!((placement.size.height - 133.333_333).abs() < 1e-3);
    assert_eq!(placement.position, Point::new(25.0, 50.0));

    session
        .harmonize(&harmonizer, Some("  "))
        .await
        .unwrap();

    assert_eq!(generator.calls(), 1);
    {
        let requests = generator.requests.lock().unwrap();
        let request = &requests[0];
        assert_eq!(request.image.mime_type(), "image/jpeg");
        // Composited at the room's natural resolution.
        let sent = request.image.decode().unwrap();
        assert_eq!(sent.dimensions(), (800, 600));
        assert!(request.instruction.contains("a 300 pixel wide box"));
        // Blank instructions count as none.
        assert!(request.instruction.contains("Do not change the size"));
    }

    assert_eq!(session.state(), SessionState::Harmonized);
    assert!(session.placements().is_empty());
    assert_eq!(session.display_image(), Some(&harmonized));
    assert_eq!(session.original_room(), Some(&room));
    assert!(session.undo_available());

    session.undo().unwrap();
    assert_eq!(session.display_image(), Some(&room));
    assert_eq!(session.placements().len(), 1);
    assert!((session.placements()[0].size.width - 200.0).abs() < 1e-9);
    assert!(!session.undo_available());
}

#[tokio::test]
async fn test_placement_after_harmonize_disarms_undo() {
    let generator = RecordingGenerator::new(png(40, 30, [1, 2, 3, 255]));
    let harmonizer = Harmonizer::new(generator);

    let mut session = Session::new();
    session.load_room(png(40, 30, [255; 4])).unwrap();
    let products = session.add_products(vec![roomstage::catalog::CatalogEntry::new(
        png(10, 10, [0, 0, 0, 255]),
        "a cube",
    )]);

    session.add_placement(products[0], Point::new(10.0, 10.0)).unwrap();
    session.harmonize(&harmonizer, None).await.unwrap();
    assert!(session.undo_available());

    session.add_placement(products[0], Point::new(20.0, 20.0)).unwrap();
    assert!(!session.undo_available());
    assert!(matches!(session.undo(), Err(RoomstageError::NothingToUndo)));
}

#[tokio::test]
async fn test_failed_batch_adds_nothing() {
    let describer = Arc::new(WidthDescriber {
        calls: AtomicUsize::new(0),
        fail_width: Some(2),
    });

    let mut session = Session::new();
    let uploads = vec![
        png(1, 1, [0, 0, 0, 255]),
        png(2, 1, [0, 0, 0, 255]),
        png(3, 1, [0, 0, 0, 255]),
    ];
    let err = session
        .ingest_products(describer, uploads)
        .await
        .unwrap_err();

    assert!(matches!(err, RoomstageError::Description(_)));
    assert!(session.catalog().is_empty());
    assert_eq!(session.last_error(), Some(err.user_message()));
}

#[tokio::test]
async fn test_harmonize_with_nothing_placed_makes_no_call() {
    let generator = RecordingGenerator::new(png(4, 4, [0; 4]));
    let harmonizer = Harmonizer::new(generator.clone());

    let mut session = Session::new();
    session.load_room(png(40, 30, [255; 4])).unwrap();

    let err = session.harmonize(&harmonizer, None).await.unwrap_err();
    assert!(matches!(err, RoomstageError::NoPlacements));
    assert_eq!(generator.calls(), 0);
    assert_eq!(session.state(), SessionState::RoomLoaded);
}

#[tokio::test]
async fn test_user_instructions_are_quoted() {
    let generator = RecordingGenerator::new(png(40, 30, [1, 2, 3, 255]));
    let harmonizer = Harmonizer::new(generator.clone());

    let mut session = Session::new();
    session.load_room(png(40, 30, [255; 4])).unwrap();
    let products = session.add_products(vec![roomstage::catalog::CatalogEntry::new(
        png(10, 10, [0, 0, 0, 255]),
        "a walnut side table",
    )]);
    session.add_placement(products[0], Point::new(20.0, 15.0)).unwrap();

    session
        .harmonize(&harmonizer, Some("turn the table to face the window"))
        .await
        .unwrap();

    let requests = generator.requests.lock().unwrap();
    assert!(
        requests[0]
            .instruction
            .contains("\"turn the table to face the window\"")
    );
    assert!(requests[0].instruction.contains("a walnut side table"));
}
