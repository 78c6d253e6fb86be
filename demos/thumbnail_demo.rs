//! Thumbnail extraction demo
//!
//! Shows the extraction event protocol and the client-side cache:
//! - Fast, exact and two-pass extraction of a thumbnail strip
//! - Replacing an in-flight request with the same identity
//! - Serving a repeated strip from the cache

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use trackrec::mock::MockThumbnailDecoder;
use trackrec::*;

async fn print_events(label: &str, mut rx: mpsc::UnboundedReceiver<ExtractionEvent>) {
    while let Some(event) = rx.recv().await {
        match event {
            ExtractionEvent::Started { timestamps_us, .. } => {
                println!("   [{}] ▶️  started, {} timestamps", label, timestamps_us.len())
            }
            ExtractionEvent::Extracted {
                index,
                thumbnail: Some(thumbnail),
                ..
            } => println!(
                "   [{}] 🖼️  #{} -> frame at {}us ({}x{})",
                label, index, thumbnail.timestamp_us, thumbnail.width, thumbnail.height
            ),
            ExtractionEvent::Extracted { index, .. } => {
                println!("   [{}] ⚠️  #{} has no frame", label, index)
            }
            ExtractionEvent::Completed { .. } => println!("   [{}] ✅ completed", label),
            ExtractionEvent::Cancelled { .. } => println!("   [{}] 🛑 cancelled", label),
            ExtractionEvent::Error { code, error, .. } => {
                println!("   [{}] ❌ {} ({})", label, error, code)
            }
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("🖼️  trackrec Thumbnail Demo");
    println!("===========================");

    let trackrec = TrackRec::init()?;
    let extractor = trackrec.extractor();
    let strip: Vec<i64> = vec![0, 1_500_000, 3_200_000, 4_900_000];

    for mode in [ExtractionMode::Fast, ExtractionMode::Exact, ExtractionMode::TwoPass] {
        println!("\n📋 {:?} extraction", mode);
        let decoder = MockThumbnailDecoder::new().with_unavailable(4_900_000);
        let rx = extractor.extract(
            "strip",
            ThumbnailExtractParameters::new(strip.clone(), decoder).with_mode(mode),
        );
        trackrec.block_on(print_events("strip", rx));
    }

    println!("\n📋 Replacing an in-flight request");
    let slow = extractor.extract(
        "scrub",
        ThumbnailExtractParameters::new(
            (0..50).map(|i| i * 100_000).collect(),
            MockThumbnailDecoder::new().with_decode_delay(Duration::from_millis(20)),
        ),
    );
    let fresh = extractor.extract(
        "scrub",
        ThumbnailExtractParameters::new(vec![2_000_000], MockThumbnailDecoder::new()),
    );
    trackrec.block_on(async {
        print_events("old", slow).await;
        print_events("new", fresh).await;
    });

    println!("\n📋 Cached loading");
    let cache = Arc::new(ThumbnailCache::new(ThumbnailCacheConfig::default()));
    let loader = trackrec.thumbnail_loader(cache.clone());
    for attempt in 1..=2 {
        let (source, rx) = loader.load(
            "cached",
            ThumbnailExtractParameters::new(strip.clone(), MockThumbnailDecoder::new()),
        );
        println!("   Attempt {}: served from {:?}", attempt, source);
        trackrec.block_on(print_events("cached", rx));
    }
    println!("   📊 {:?}", cache.stats());

    println!("\n🎉 Demo completed");
    Ok(())
}
