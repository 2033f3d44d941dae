#![cfg(feature = "serde")]

use arbor_ecs::{ComponentInfo, Context, ContextConfig};

#[test]
fn config_round_trips_through_json() {
    let config = ContextConfig::default()
        .with_initial_store_capacity(32)
        .with_verify_order(false)
        .with_max_deferred(128);
    let json = serde_json::to_string(&config).unwrap();
    let back: ContextConfig = serde_json::from_str(&json).unwrap();
    assert_eq!(back, config);
}

#[test]
fn missing_config_fields_take_defaults() {
    let config: ContextConfig = serde_json::from_str(r#"{ "max_deferred": 4 }"#).unwrap();
    assert_eq!(config, ContextConfig::default().with_max_deferred(4));
}

#[test]
fn identity_records_serialize() {
    let mut ctx = Context::new();
    let root = ctx.create_entity().unwrap();
    let child = ctx.create_entity().unwrap();
    ctx.attach(root, child).unwrap();
    let info = ctx.info(child).unwrap();

    let value = serde_json::to_value(info).unwrap();
    assert_eq!(value["parent"], serde_json::json!(root));
    assert_eq!(value["depth"], serde_json::json!(1));
    let back: ComponentInfo = serde_json::from_value(value).unwrap();
    assert_eq!(back, info);
}
