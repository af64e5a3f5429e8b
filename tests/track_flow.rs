use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::broadcast;

use trackmeta::{
    BusNotifier, Message, StreamBurst, StreamTagReconciler, StreamValue, TagCodecRegistry,
    TagCodecResult, TagError, TagFormat, TagMap, TagValue, TrackContext, TrackMessage,
    TrackRegistry, TrackSettings,
};

/// Serves the same tags for every `.mem` location.
struct MemoryFormat {
    tags: TagCodecResult,
}

impl TagFormat for MemoryFormat {
    fn name(&self) -> &str {
        "memory"
    }

    fn read_all(&self, _location: &str) -> Result<TagCodecResult, TagError> {
        Ok(self.tags.clone())
    }

    fn write_tags(&self, location: &str, _tags: &TagMap) -> Result<(), TagError> {
        Err(TagError::codec(location, "read-only"))
    }
}

struct MemoryCodecs(Arc<MemoryFormat>);

impl TagCodecRegistry for MemoryCodecs {
    fn format_for(&self, location: &str) -> Option<Arc<dyn TagFormat>> {
        if location.ends_with(".mem") {
            let format: Arc<dyn TagFormat> = self.0.clone();
            Some(format)
        } else {
            None
        }
    }
}

fn setup() -> (TrackRegistry, broadcast::Receiver<Message>) {
    let mut tags = BTreeMap::new();
    tags.insert("artist".to_string(), TagValue::List(vec!["Low".to_string()]));
    tags.insert("title".to_string(), TagValue::List(vec!["Words".to_string()]));
    let codecs = MemoryCodecs(Arc::new(MemoryFormat { tags }));

    let (bus_sender, bus_receiver) = broadcast::channel(64);
    let context = Arc::new(TrackContext::new(
        Arc::new(BusNotifier::new(bus_sender)),
        Arc::new(codecs),
        TrackSettings::default(),
    ));
    (TrackRegistry::new(context), bus_receiver)
}

fn drain(receiver: &mut broadcast::Receiver<Message>) -> Vec<TrackMessage> {
    let mut messages = Vec::new();
    while let Ok(Message::Track(message)) = receiver.try_recv() {
        messages.push(message);
    }
    messages
}

#[test]
fn test_scan_is_silent_and_edits_are_published() {
    let (registry, mut bus) = setup();
    let track = registry.resolve_or_create("memory://album/01.mem");

    assert!(track.is_scan_valid());
    assert_eq!(track.get_tag_display("artist"), "Low");
    assert!(drain(&mut bus).is_empty());

    track.set_tag("genre", "Slowcore", false);
    assert_eq!(
        drain(&mut bus),
        vec![TrackMessage::TagsChanged {
            location: Some("memory://album/01.mem".to_string()),
            tag: "genre".to_string(),
        }]
    );

    let again = registry.resolve_or_create("memory://album/01.mem");
    assert!(Arc::ptr_eq(&track, &again));
    assert_eq!(again.get_tag_display("genre"), "Slowcore");
    assert!(drain(&mut bus).is_empty());

    assert!(matches!(track.write_tags(), Err(TagError::CodecFailure { .. })));
    assert!(track.is_dirty());
}

#[test]
fn test_stream_bursts_reach_the_bus() {
    let (registry, mut bus) = setup();
    let station = registry.resolve_or_create("http://radio.example.com/live.ogg");
    assert!(!station.is_scan_valid());
    let reconciler = StreamTagReconciler::for_track(&station);

    let mut burst = StreamBurst::new();
    burst.insert("title".to_string(), StreamValue::from("Artist - Song"));
    burst.insert("bitrate".to_string(), StreamValue::UInt(192_000));

    assert!(reconciler.reconcile(&station, &burst));
    let messages = drain(&mut bus);
    assert_eq!(
        messages.last(),
        Some(&TrackMessage::StreamSongChanged {
            location: Some("http://radio.example.com/live.ogg".to_string()),
        })
    );
    let tags: Vec<&str> = messages
        .iter()
        .filter_map(|message| match message {
            TrackMessage::TagsChanged { tag, .. } => Some(tag.as_str()),
            TrackMessage::StreamSongChanged { .. } => None,
        })
        .collect();
    assert!(tags.contains(&"title"));
    assert!(tags.contains(&"artist"));
    assert!(tags.contains(&"__bitrate"));
    assert_eq!(station.get_bitrate_display(), "192k");
    assert_eq!(station.to_string(), "'Song' by 'Artist'");

    assert!(!reconciler.reconcile(&station, &burst));
}

#[test]
fn test_snapshot_restore_after_release() {
    let (registry, _bus) = setup();
    let track = registry.resolve_or_create("memory://album/02.mem");
    track.set_rating(4.0);
    let snapshot = track.persist_snapshot();
    let json = serde_json::to_string(&snapshot).expect("serialize snapshot");
    drop(track);
    assert!(registry.lookup("memory://album/02.mem").is_none());

    let decoded = serde_json::from_str(&json).expect("deserialize snapshot");
    let restored = registry.restore(&decoded);
    assert_eq!(restored.get_rating(), 4);
    assert_eq!(restored.get_tag_display("title"), "Words");
    assert_eq!(restored.snapshot(), snapshot);
    assert!(Arc::ptr_eq(
        &registry.lookup("memory://album/02.mem").expect("restored"),
        &restored
    ));
}
