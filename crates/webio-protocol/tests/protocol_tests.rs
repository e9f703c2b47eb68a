//! Protocol layer tests: inbound message validation, outbound shapes, config resolution.

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use serde_json::json;
    use webio_protocol::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    // ─────────────────────────────────────────────────────────────────────
    // InboundMessage
    // ─────────────────────────────────────────────────────────────────────

    #[test]
    fn parses_event_message_and_keeps_full_body() {
        let msg = InboundMessage::parse(r#"{"type":"event","value":42}"#).unwrap();
        assert_eq!(msg.kind(), MessageKind::Event);
        assert_eq!(msg.body(), &json!({"type": "event", "value": 42}));
        assert_eq!(msg.get("value"), Some(&json!(42)));
    }

    #[test]
    fn every_known_kind_parses() {
        for kind in MessageKind::ALL {
            let text = json!({"type": kind.as_str()}).to_string();
            let msg = InboundMessage::parse(&text).unwrap();
            assert_eq!(msg.kind(), kind);
        }
    }

    #[test]
    fn malformed_json_terminates_session() {
        let err = InboundMessage::parse("{not json").unwrap_err();
        assert!(matches!(err, MessageError::Malformed(_)));
        assert!(err.terminates_session());
    }

    #[test]
    fn non_object_is_skipped_not_fatal() {
        let err = InboundMessage::parse("[1, 2, 3]").unwrap_err();
        assert!(matches!(err, MessageError::NotAnObject));
        assert!(!err.terminates_session());
    }

    #[test]
    fn missing_type_is_rejected() {
        let err = InboundMessage::parse(r#"{"value": 1}"#).unwrap_err();
        assert!(matches!(err, MessageError::MissingType));

        let err = InboundMessage::parse(r#"{"type": 7}"#).unwrap_err();
        assert!(matches!(err, MessageError::MissingType));
    }

    #[test]
    fn unknown_kind_is_rejected_with_its_name() {
        let err = InboundMessage::parse(r#"{"type": "teleport"}"#).unwrap_err();
        match err {
            MessageError::UnknownKind(tag) => assert_eq!(tag, "teleport"),
            other => panic!("expected UnknownKind, got {other:?}"),
        }
    }

    #[test]
    fn message_kind_serde_matches_tags() {
        assert_eq!(serde_json::to_value(MessageKind::Request).unwrap(), json!("request"));
        let kind: MessageKind = serde_json::from_value(json!("sync")).unwrap();
        assert_eq!(kind, MessageKind::Sync);
        assert_eq!(MessageKind::from_tag("nope"), None);
    }

    // ─────────────────────────────────────────────────────────────────────
    // OutboundMessage
    // ─────────────────────────────────────────────────────────────────────

    #[test]
    fn outbound_command_shape() {
        let msg = OutboundMessage::command("setup_scope", Some("scope-1".into()), json!({"a": 1}));
        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            json!({"type": "command", "command": "setup_scope", "scope": "scope-1", "data": {"a": 1}})
        );
    }

    #[test]
    fn outbound_command_omits_empty_fields() {
        let msg = OutboundMessage::command("reload", None, serde_json::Value::Null);
        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            json!({"type": "command", "command": "reload"})
        );
    }

    #[test]
    fn outbound_response_uses_camel_case_request_id() {
        let msg = OutboundMessage::response(json!("req-9"), json!([1, 2]));
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["type"], "response");
        assert_eq!(value["requestId"], "req-9");
        assert_eq!(value["payload"], json!([1, 2]));
    }

    #[test]
    fn outbound_update_shape() {
        let msg = OutboundMessage::update("s", "count", json!(3));
        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            json!({"type": "update", "scope": "s", "name": "count", "value": 3})
        );
    }

    // ─────────────────────────────────────────────────────────────────────
    // ServerConfig
    // ─────────────────────────────────────────────────────────────────────

    #[test]
    fn config_defaults() {
        let config = ServerConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.http_port, 8081);
        assert_eq!(config.ws_route, "/webio_websocket/");
        assert_eq!(config.ws_url, "ws://127.0.0.1:8081/webio_websocket/");
        assert_eq!(config.asset_base_url, "http://127.0.0.1:8081");
        assert_eq!(config, ServerConfig::default());
    }

    #[test]
    fn config_reads_overrides() {
        let config = ServerConfig::from_lookup(lookup(&[
            (ConfigKeys::HOST, "0.0.0.0"),
            (ConfigKeys::HTTP_PORT, "9000"),
            (ConfigKeys::WS_ROUTE, "/ws/"),
        ]))
        .unwrap();
        assert_eq!(config.bind_address(), "0.0.0.0:9000");
        assert_eq!(config.ws_url, "ws://0.0.0.0:9000/ws/");
    }

    #[test]
    fn explicit_ws_url_and_base_url_win() {
        let config = ServerConfig::from_lookup(lookup(&[
            (ConfigKeys::WS_URL, "wss://proxy.example/socket"),
            (ConfigKeys::BASE_URL, "https://proxy.example/app/"),
        ]))
        .unwrap();
        assert_eq!(config.ws_url, "wss://proxy.example/socket");
        assert_eq!(config.asset_url("/assetserver/x"), "https://proxy.example/app/assetserver/x");
    }

    #[test]
    fn empty_values_fall_back_to_defaults() {
        let config = ServerConfig::from_lookup(lookup(&[(ConfigKeys::HTTP_PORT, "  ")])).unwrap();
        assert_eq!(config.http_port, 8081);
    }

    #[test]
    fn invalid_port_is_a_config_error() {
        let err = ServerConfig::from_lookup(lookup(&[(ConfigKeys::HTTP_PORT, "eighty")])).unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidPort { key: ConfigKeys::HTTP_PORT, value: "eighty".into() }
        );

        let err = ServerConfig::from_lookup(lookup(&[(ConfigKeys::HTTP_PORT, "70000")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPort { .. }));
    }

    #[test]
    fn invalid_route_is_a_config_error() {
        let err = ServerConfig::from_lookup(lookup(&[(ConfigKeys::WS_ROUTE, "ws")])).unwrap_err();
        assert_eq!(err, ConfigError::InvalidRoute("ws".into()));
        assert!(ServerConfig::default().with_ws_route("no slash").is_err());
    }

    #[test]
    fn pattern_routes_are_config_errors() {
        for route in ["/ws/:id", "/ws/*rest", "/ws/{id}", "/ws/{", "/"] {
            let err = ServerConfig::default().with_ws_route(route).unwrap_err();
            assert_eq!(err, ConfigError::InvalidRoute(route.into()), "route {route}");

            let err = ServerConfig::from_lookup(lookup(&[(ConfigKeys::WS_ROUTE, route)])).unwrap_err();
            assert_eq!(err, ConfigError::InvalidRoute(route.into()), "route {route}");
        }
        assert!(ServerConfig::default().with_ws_route("/ws/a:b").is_ok());
        assert!(ServerConfig::default().with_ws_route("/nested/socket/").is_ok());
    }

    #[test]
    fn validate_catches_hand_edited_routes() {
        assert!(ServerConfig::default().validate().is_ok());

        let mut config = ServerConfig::default();
        config.ws_route = "/ws/:id".into();
        assert_eq!(config.validate(), Err(ConfigError::InvalidRoute("/ws/:id".into())));
    }

    #[test]
    fn address_change_keeps_explicit_urls() {
        let overridden = ServerConfig::from_lookup(lookup(&[
            (ConfigKeys::WS_URL, "wss://proxy.example/socket"),
            (ConfigKeys::BASE_URL, "https://proxy.example/app"),
        ]))
        .unwrap()
        .with_address("0.0.0.0", 9000)
        .unwrap();
        assert_eq!(overridden.bind_address(), "0.0.0.0:9000");
        assert_eq!(overridden.ws_url, "wss://proxy.example/socket");
        assert_eq!(overridden.asset_base_url, "https://proxy.example/app");

        let derived = ServerConfig::default().with_address("localhost", 9000).unwrap();
        assert_eq!(derived.ws_url, "ws://localhost:9000/webio_websocket/");
        assert_eq!(derived.asset_base_url, "http://localhost:9000");

        assert!(ServerConfig::default().with_address("http://x", 1).is_err());
    }

    #[test]
    fn route_change_keeps_explicit_ws_url() {
        let derived = ServerConfig::new("127.0.0.1", 8081).with_ws_route("/socket").unwrap();
        assert_eq!(derived.ws_url, "ws://127.0.0.1:8081/socket");

        let overridden = ServerConfig::from_lookup(lookup(&[(ConfigKeys::WS_URL, "wss://proxy/ws")]))
            .unwrap()
            .with_ws_route("/socket")
            .unwrap();
        assert_eq!(overridden.ws_route, "/socket");
        assert_eq!(overridden.ws_url, "wss://proxy/ws");
    }

    #[test]
    fn invalid_host_is_a_config_error() {
        let err = ServerConfig::from_lookup(lookup(&[(ConfigKeys::HOST, "http://x")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidHost(_)));
    }

    #[test]
    fn bound_port_rederives_default_urls_only() {
        let config = ServerConfig::new("127.0.0.1", 0).with_bound_port(4321);
        assert_eq!(config.http_port, 4321);
        assert_eq!(config.ws_url, "ws://127.0.0.1:4321/webio_websocket/");
        assert_eq!(config.asset_base_url, "http://127.0.0.1:4321");

        let mut proxied = ServerConfig::new("127.0.0.1", 0);
        proxied.ws_url = "wss://proxy/ws".into();
        let proxied = proxied.with_bound_port(4321);
        assert_eq!(proxied.ws_url, "wss://proxy/ws");
    }
}
