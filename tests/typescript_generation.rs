//! TypeScript Generation Tests
//!
//! Validates that consumer-facing types can be exported to TypeScript
//! when the tauri feature is enabled.

#[cfg(feature = "tauri")]
#[test]
fn test_core_types_implement_specta_type() {
    use specta::Type;

    // If this compiles, all types are properly configured for TypeScript export.
    fn assert_type<T: Type>() {}

    // Snapshot types
    assert_type::<pitlane::TimingSnapshot>();
    assert_type::<pitlane::DriverRecord>();
    assert_type::<pitlane::PositionRecord>();
    assert_type::<pitlane::TimingRecord>();
    assert_type::<pitlane::SessionSummary>();
    assert_type::<pitlane::RunningStatus>();
    assert_type::<pitlane::UpdateRate>();
    assert_type::<pitlane::FeedStatus>();

    // Replay types
    assert_type::<pitlane::TelemetrySample>();
    assert_type::<pitlane::ResampledTrace>();
}

#[cfg(not(feature = "tauri"))]
#[test]
fn test_tauri_feature_disabled() {
    // Types still compile without specta::Type
    let _ = pitlane::UpdateRate::Native;
    let _ = pitlane::TimingSnapshot::default();
}
