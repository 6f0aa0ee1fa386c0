mod common;

mod tests {
    use crate::common::{
        FakePlatform, FakeSntp, GEO_URL, ScriptedHttp, ScriptedRadio, SharedRtc, at, test_config,
    };
    use countdown_light::{
        Duration, NetworkLink, TimeService, calendar::UtcOffset, error::ConnectivityError,
    };

    type Link = NetworkLink<ScriptedRadio, ScriptedHttp>;

    fn connected(http: ScriptedHttp) -> (Link, FakePlatform) {
        let mut platform = FakePlatform::default();
        let mut link = NetworkLink::new(ScriptedRadio::default(), http, "home", "secret");
        link.connect(&mut platform, Duration::from_secs(1), 1).unwrap();
        (link, platform)
    }

    fn zone_http(zone: &str, offset: &str) -> ScriptedHttp {
        ScriptedHttp::default()
            .with_body(GEO_URL, format!(r#"{{"ip":"203.0.113.9","timezone":"{zone}"}}"#))
            .with_body(
                &format!("http://tz.test/{zone}"),
                format!(r#"{{"utc_offset":"{offset}","abbreviation":"X"}}"#),
            )
    }

    #[test]
    fn test_resolves_offset_from_public_address() {
        let (mut link, mut platform) = connected(zone_http("Asia/Kathmandu", "+05:45"));
        let clock = SharedRtc::new(at(2025, 12, 24, 20, 0));
        let mut time = TimeService::new(FakeSntp::unreachable(), clock, &test_config());

        let offset = time.resolve_timezone(&mut link, &mut platform);

        assert_eq!(offset.minutes(), 345);
        assert_eq!(time.local_now(), at(2025, 12, 25, 1, 45));
    }

    #[test]
    fn test_lookup_failure_falls_back_to_default_offset() {
        let (mut link, mut platform) = connected(
            ScriptedHttp::default().with_body(GEO_URL, r#"{"status":"fail"}"#),
        );
        let config = test_config().with_default_utc_offset(-300);
        let mut time = TimeService::new(
            FakeSntp::unreachable(),
            SharedRtc::new(at(2025, 12, 25, 3, 0)),
            &config,
        );

        assert_eq!(time.resolve_timezone(&mut link, &mut platform), UtcOffset::from_minutes(-300).unwrap());
        assert_eq!(time.local_now(), at(2025, 12, 24, 22, 0));
    }

    #[test]
    fn test_invalid_offset_text_falls_back() {
        let (mut link, mut platform) = connected(zone_http("Mars/Olympus", "soon"));
        let mut time = TimeService::new(
            FakeSntp::unreachable(),
            SharedRtc::new(at(2025, 12, 25, 3, 0)),
            &test_config(),
        );

        assert_eq!(time.resolve_timezone(&mut link, &mut platform), UtcOffset::UTC);
    }

    #[test]
    fn test_non_ascii_offset_text_falls_back() {
        let (mut link, mut platform) = connected(zone_http("Europe/Paris", "+1\u{e9}1"));
        let config = test_config().with_default_utc_offset(60);
        let mut time = TimeService::new(
            FakeSntp::unreachable(),
            SharedRtc::new(at(2025, 12, 25, 3, 0)),
            &config,
        );

        assert_eq!(
            time.resolve_timezone(&mut link, &mut platform),
            UtcOffset::from_minutes(60).unwrap()
        );
    }

    #[test]
    fn test_sync_sets_the_clock() {
        let (mut link, mut platform) = connected(ScriptedHttp::default());
        let clock = SharedRtc::new(at(1970, 1, 1, 0, 0));
        let mut time = TimeService::new(
            FakeSntp::answering(at(2025, 12, 20, 18, 0)),
            clock.clone(),
            &test_config(),
        );
        assert!(!time.clock_is_valid());

        assert_eq!(time.sync_clock(&mut link, &mut platform), Ok(at(2025, 12, 20, 18, 0)));
        assert_eq!(clock.get(), at(2025, 12, 20, 18, 0));
        assert!(time.clock_is_valid());
    }

    #[test]
    fn test_failed_sync_keeps_clock_running() {
        let (mut link, mut platform) = connected(ScriptedHttp::default());
        let clock = SharedRtc::new(at(2025, 12, 20, 18, 0));
        let mut time = TimeService::new(FakeSntp::unreachable(), clock.clone(), &test_config());

        assert_eq!(
            time.sync_clock(&mut link, &mut platform),
            Err(ConnectivityError::Timeout(1000))
        );
        assert_eq!(clock.get(), at(2025, 12, 20, 18, 0));
        assert!(time.clock_is_valid());
    }

    #[test]
    fn test_sync_refused_while_disconnected() {
        let mut platform = FakePlatform::default();
        let mut link = NetworkLink::new(ScriptedRadio::default(), ScriptedHttp::default(), "home", "secret");
        let mut time = TimeService::new(
            FakeSntp::answering(at(2025, 12, 20, 18, 0)),
            SharedRtc::new(at(1970, 1, 1, 0, 0)),
            &test_config(),
        );

        assert_eq!(
            time.sync_clock(&mut link, &mut platform),
            Err(ConnectivityError::NotConnected)
        );
        assert!(!time.clock_is_valid());
    }
}
