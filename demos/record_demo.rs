//! Audio + video recording demo
//!
//! Records a 720p video track and a mono AAC audio track into one media
//! target, using the in-memory collaborators from `trackrec::mock`:
//! - Both tracks share one target and register before any sample is written
//! - `finish` drains both encoders to end of stream
//! - A second request is stopped mid-way instead

use std::time::Duration;
use trackrec::mock::{
    MockBufferReader, MockEncoder, MockMediaTarget, MockSurfaceReader, MockSurfaceRenderer,
    TargetCall,
};
use trackrec::*;
use uuid::Uuid;

const VIDEO_MIME: &str = "video/avc";
const AUDIO_MIME: &str = "audio/mp4a-latm";
const WIDTH: u32 = 1280;
const HEIGHT: u32 = 720;
const FRAME_RATE: u32 = 30;
const SAMPLE_RATE: u32 = 44_100;
const CHANNELS: u32 = 1;

fn video_format() -> MediaFormat {
    MediaFormat::video(VIDEO_MIME, WIDTH, HEIGHT)
        .with_frame_rate(FRAME_RATE)
        .with_key_frame_interval(5)
        .with_bit_rate(video_bitrate(WIDTH, HEIGHT, FRAME_RATE))
}

fn audio_format() -> MediaFormat {
    MediaFormat::audio(AUDIO_MIME, SAMPLE_RATE, CHANNELS)
        .with_bit_rate(audio_bitrate(SAMPLE_RATE, CHANNELS))
}

fn tracks(target: &MediaTargetHandle, audio_frames: usize) -> Vec<TrackRecordParameters> {
    vec![
        TrackRecordParameters::new(
            TrackReader::surface(MockSurfaceReader::new()),
            0,
            video_format(),
            target.clone(),
            MockEncoder::new(video_format())
                .with_input_surface(SurfaceHandle(1))
                .with_codec_config(),
        )
        .with_renderer(TrackRenderer::surface(MockSurfaceRenderer::new(16 * 1024))),
        TrackRecordParameters::new(
            TrackReader::buffer(
                MockBufferReader::new(audio_frames, 2048).with_read_delay(Duration::from_millis(1)),
            ),
            1,
            audio_format(),
            target.clone(),
            MockEncoder::new(audio_format()),
        ),
    ]
}

fn summarize(calls: &[TargetCall]) {
    let mut writes = [0usize; 2];
    let mut bytes = 0usize;
    for call in calls {
        match call {
            TargetCall::AddTrack {
                mime_type, actual, ..
            } => println!("   🎞️  Track {} registered as {}", actual, mime_type),
            TargetCall::Write {
                track_index, size, ..
            } => {
                if let Some(count) = writes.get_mut(*track_index) {
                    *count += 1;
                }
                bytes += size;
            }
            TargetCall::Release => println!("   📦 Media target released"),
        }
    }
    println!(
        "   📊 {} video samples, {} audio samples, {} bytes",
        writes[0], writes[1], bytes
    );
}

async fn wait_terminal(
    events: &mut tokio::sync::broadcast::Receiver<RecordEvent>,
    id: &str,
) -> anyhow::Result<RecordEvent> {
    loop {
        let event = tokio::time::timeout(Duration::from_secs(10), events.recv()).await??;
        if event.request_id() != id {
            continue;
        }
        println!("   📨 {:?}", event);
        if event.is_terminal() {
            return Ok(event);
        }
    }
}

fn main() -> anyhow::Result<()> {
    println!("🎬 trackrec Recording Demo");
    println!("==========================");

    let trackrec = TrackRec::init_with(GlobalConfig {
        debug_logging: true,
        log_filter: "trackrec_recorder=info".to_string(),
        ..Default::default()
    })?;
    let recorder = trackrec.recorder();
    let mut events = recorder.subscribe();

    println!("\n📋 Step 1: Record until both tracks reach end of stream");
    println!(
        "   Video: {} {}x{} @ {}fps, {} bps",
        VIDEO_MIME,
        WIDTH,
        HEIGHT,
        FRAME_RATE,
        video_bitrate(WIDTH, HEIGHT, FRAME_RATE)
    );
    println!(
        "   Audio: {} {}Hz x{}, {} bps",
        AUDIO_MIME,
        SAMPLE_RATE,
        CHANNELS,
        audio_bitrate(SAMPLE_RATE, CHANNELS)
    );

    let id = Uuid::new_v4().to_string();
    let target = MockMediaTarget::new();
    let calls = target.calls();
    let target = MediaTargetHandle::new(target);

    recorder.record(&id, tracks(&target, 90))?;
    if let Some(info) = recorder.request_info(&id) {
        println!("   ▶️  Request {} started with {} tracks", info.id, info.track_count);
    }

    let terminal = trackrec.block_on(async {
        tokio::time::sleep(Duration::from_millis(200)).await;
        recorder.finish(&id);
        wait_terminal(&mut events, &id).await
    })?;
    println!("✅ Request ended: {:?}", terminal);
    summarize(&calls.lock());

    println!("\n📋 Step 2: Stop a recording mid-way");
    let id = Uuid::new_v4().to_string();
    let target = MockMediaTarget::new();
    let calls = target.calls();
    let target = MediaTargetHandle::new(target);

    recorder.record(&id, tracks(&target, usize::MAX))?;
    let terminal = trackrec.block_on(async {
        tokio::time::sleep(Duration::from_millis(100)).await;
        recorder.stop(&id);
        wait_terminal(&mut events, &id).await
    })?;
    println!("✅ Request ended: {:?}", terminal);
    summarize(&calls.lock());

    println!("\n📋 Step 3: Duplicate identities are rejected");
    let id = "duplicate";
    let target = MediaTargetHandle::new(MockMediaTarget::new());
    recorder.record(id, tracks(&target, usize::MAX))?;
    match recorder.record(id, tracks(&target, 10)) {
        Err(e) => println!("   ⚠️  {} ({})", e, e.error_code()),
        Ok(()) => println!("   ❌ second request was accepted"),
    }
    recorder.stop(id);

    trackrec.shutdown();
    println!("\n🎉 Demo completed");
    Ok(())
}
