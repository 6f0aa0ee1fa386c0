mod common;

mod tests {
    use crate::common::{
        FakePlatform, MemoryStorage, SETTINGS_URL, ScriptedHttp, ScriptedRadio, christmas_settings,
        settings_json, test_config,
    };
    use countdown_light::{
        ConfigService, Duration, Error, ErrorKind, EventSettings, NetworkLink,
        config_service::SettingsSource, error::ConnectivityError,
    };

    type Link = NetworkLink<ScriptedRadio, ScriptedHttp>;

    fn connected(http: ScriptedHttp) -> (Link, FakePlatform) {
        let mut platform = FakePlatform::default();
        let mut link = NetworkLink::new(ScriptedRadio::default(), http, "home", "secret");
        link.connect(&mut platform, Duration::from_secs(1), 1).unwrap();
        (link, platform)
    }

    #[test]
    fn test_starts_with_defaults() {
        let service = ConfigService::new(&test_config());
        assert_eq!(service.source(), SettingsSource::Defaults);
        assert_eq!(service.settings(), &EventSettings::default());
    }

    #[test]
    fn test_fetch_adopts_and_caches() {
        let (mut link, mut platform) = connected(
            ScriptedHttp::default().with_body(SETTINGS_URL, settings_json("2026-03-01", "2026-03-15")),
        );
        let mut storage = MemoryStorage::default();
        let config = test_config();
        let mut service = ConfigService::new(&config);

        let settings = service.fetch(&mut link, &mut storage, &mut platform).unwrap();
        assert_eq!(settings.countdown_length(), 14);
        assert_eq!(service.source(), SettingsSource::Remote);

        let mut reloaded = ConfigService::new(&config);
        reloaded.load_cached(&storage).unwrap();
        assert_eq!(reloaded.source(), SettingsSource::Cache);
        assert_eq!(reloaded.settings(), service.settings());
    }

    #[test]
    fn test_malformed_document_keeps_previous_settings() {
        let (mut link, mut platform) =
            connected(ScriptedHttp::default().with_body(SETTINGS_URL, christmas_settings()));
        let mut storage = MemoryStorage::default();
        let mut service = ConfigService::new(&test_config());
        service.fetch(&mut link, &mut storage, &mut platform).unwrap();
        let before = service.settings().clone();
        let cached = storage.files.clone();

        link.http_mut().set_body(SETTINGS_URL, r#"{"ImportantDate": "not a date"}"#);
        let err = service.fetch(&mut link, &mut storage, &mut platform).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::RemoteData);
        assert_eq!(service.settings(), &before);
        assert_eq!(storage.files, cached);
    }

    #[test]
    fn test_unreachable_server_keeps_previous_settings() {
        let mut http = ScriptedHttp::default();
        http.set_reply(SETTINGS_URL, Err(ConnectivityError::Timeout(1000)));
        let (mut link, mut platform) = connected(http);
        let mut storage = MemoryStorage::default();
        let mut service = ConfigService::new(&test_config());

        let err = service.fetch(&mut link, &mut storage, &mut platform).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Connectivity);
        assert_eq!(service.source(), SettingsSource::Defaults);
        assert_eq!(service.settings(), &EventSettings::default());
        assert_eq!(
            link.http().requests_to(SETTINGS_URL),
            test_config().http.attempts() as usize
        );
    }

    #[test]
    fn test_fetch_refused_while_disconnected() {
        let mut platform = FakePlatform::default();
        let mut link = NetworkLink::new(
            ScriptedRadio::default(),
            ScriptedHttp::default().with_body(SETTINGS_URL, christmas_settings()),
            "home",
            "secret",
        );
        let mut storage = MemoryStorage::default();
        let mut service = ConfigService::new(&test_config());

        let err = service.fetch(&mut link, &mut storage, &mut platform).unwrap_err();

        assert_eq!(err, Error::from(ConnectivityError::NotConnected));
        assert!(link.http().requests.is_empty());
    }

    #[test]
    fn test_corrupt_cache_is_ignored() {
        let config = test_config();
        let storage = MemoryStorage::default().with_file(&config.paths.settings_cache, "{{{");
        let mut service = ConfigService::new(&config);

        assert!(service.load_cached(&storage).is_err());
        assert_eq!(service.source(), SettingsSource::Defaults);
    }
}
