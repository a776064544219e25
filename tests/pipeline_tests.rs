use async_trait::async_trait;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, RgbImage};
use pixelup::domain::ports::BaseTransform;
use pixelup::domain::pricing::Tier;
use pixelup::domain::request::UpscaleRequest;
use pixelup::error::{Result, UpscaleError};
use pixelup::pipeline::TierComposer;
use std::io::Cursor;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

fn encode(img: &DynamicImage) -> Vec<u8> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .unwrap();
    buf
}

fn test_input(width: u32, height: u32) -> Vec<u8> {
    encode(&DynamicImage::ImageRgb8(RgbImage::from_fn(
        width,
        height,
        |x, y| image::Rgb([(x * 31 % 256) as u8, (y * 17 % 256) as u8, 127]),
    )))
}

fn dimensions(bytes: &[u8]) -> (u32, u32) {
    let img = image::load_from_memory(bytes).unwrap();
    (img.width(), img.height())
}

/// Stand-in for the model: nearest-neighbor 4x, counts invocations.
struct Fake4x {
    calls: AtomicUsize,
}

impl Fake4x {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl BaseTransform for Fake4x {
    async fn transform(&self, image: &[u8]) -> Result<Vec<u8>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let img = image::load_from_memory(image)
            .map_err(|e| UpscaleError::ComputeFailed(e.to_string()))?;
        let scaled = img.resize_exact(img.width() * 4, img.height() * 4, FilterType::Nearest);
        Ok(encode(&scaled))
    }
}

fn request(tier: Tier, enhance: bool) -> UpscaleRequest {
    UpscaleRequest { tier, enhance }
}

#[tokio::test]
async fn test_tier_4_dimensions_and_single_invocation() {
    let fake = Fake4x::new();
    let composer = TierComposer::new(fake.clone());

    let out = composer
        .run(&test_input(8, 6), request(Tier::X4, false))
        .await
        .unwrap();

    assert_eq!(dimensions(&out), (32, 24));
    assert_eq!(fake.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_tier_2_dimensions_and_single_invocation() {
    let fake = Fake4x::new();
    let composer = TierComposer::new(fake.clone());

    let out = composer
        .run(&test_input(8, 6), request(Tier::X2, false))
        .await
        .unwrap();

    assert_eq!(dimensions(&out), (16, 12));
    assert_eq!(fake.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_tier_8_dimensions_and_double_invocation() {
    let fake = Fake4x::new();
    let composer = TierComposer::new(fake.clone());

    let out = composer
        .run(&test_input(8, 6), request(Tier::X8, false))
        .await
        .unwrap();

    assert_eq!(dimensions(&out), (64, 48));
    assert_eq!(fake.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_enhance_preserves_dimensions() {
    let fake = Fake4x::new();
    let composer = TierComposer::new(fake.clone());

    let out = composer
        .run(&test_input(8, 6), request(Tier::X4, true))
        .await
        .unwrap();

    // Smoothing touches pixel content only, never the output geometry.
    assert_eq!(dimensions(&out), (32, 24));
    assert_eq!(fake.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_odd_dimensions_survive_halving() {
    let composer = TierComposer::new(Fake4x::new());

    // 7x5 -> 28x20 after the base pass -> 14x10 after the halve.
    let out = composer
        .run(&test_input(7, 5), request(Tier::X2, false))
        .await
        .unwrap();

    assert_eq!(dimensions(&out), (14, 10));
}

#[tokio::test]
async fn test_output_is_deterministic() {
    let composer = TierComposer::new(Fake4x::new());

    let input = test_input(8, 6);
    let first = composer.run(&input, request(Tier::X2, true)).await.unwrap();
    let second = composer.run(&input, request(Tier::X2, true)).await.unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_garbage_input_is_compute_failure() {
    let composer = TierComposer::new(Fake4x::new());
    let result = composer.run(b"not an image", request(Tier::X4, false)).await;
    assert!(matches!(result, Err(UpscaleError::ComputeFailed(_))));
}
