use super::*;
use futures_util::StreamExt;

fn no_env() -> EnvLookup { EnvLookup::from_vars(Vec::<(String, String)>::new()) }

fn write_cfg(dir: &Path, body: &str) {
    std::fs::create_dir_all(dir).unwrap();
    std::fs::write(dir.join(crate::config::CONFIG_FILE), body).unwrap();
}

#[tokio::test]
async fn test_main_only() {
    let tmp = tempfile::tempdir().unwrap();
    let reg = Registry::init_with(tmp.path(), &no_env()).await.unwrap();
    assert_eq!(reg.len(), 1);
    assert_eq!(reg.main().id(), "sossbox");
    assert!(reg.get("sossbox").is_some());
    assert!(reg.sites_dir().is_none());
}

#[tokio::test]
async fn test_conventional_sites_folder_in_order() {
    let tmp = tempfile::tempdir().unwrap();
    write_cfg(tmp.path(), r#"{"id": "main", "secret": "m"}"#);
    write_cfg(&tmp.path().join("sites/beta"), r#"{"name": "Beta"}"#);
    write_cfg(&tmp.path().join("sites/alpha"), "# alpha\n{\"id\": \"acme\", \"secret\": \"s3cr3t\", \"registration\": true}\n");
    std::fs::write(tmp.path().join("sites/README.md"), "not a tenant").unwrap();
    std::fs::create_dir_all(tmp.path().join("sites/.hidden")).unwrap();

    let reg = Registry::init_with(tmp.path(), &no_env()).await.unwrap();
    assert_eq!(reg.ids().collect::<Vec<_>>(), vec!["main", "acme", "beta"]);
    let acme = reg.get("acme").unwrap();
    assert_eq!(acme.config().secret, "s3cr3t");
    assert_eq!(acme.data_root().unwrap(), tmp.path().join("sites/alpha/data"));
    assert!(tmp.path().join("sites/alpha/data/logins").is_dir());
    assert_eq!(reg.get("beta").unwrap().name(), "Beta");
}

#[tokio::test]
async fn test_configured_sites_folder() {
    let tmp = tempfile::tempdir().unwrap();
    write_cfg(tmp.path(), r#"{"sites": "tenants"}"#);
    write_cfg(&tmp.path().join("tenants/one"), "{}");
    let reg = Registry::init_with(tmp.path(), &no_env()).await.unwrap();
    assert_eq!(reg.sites_dir(), Some(tmp.path().join("tenants").as_path()));
    assert!(reg.get("one").is_some());
}

#[tokio::test]
async fn test_broken_sub_tenant_is_skipped() {
    let tmp = tempfile::tempdir().unwrap();
    write_cfg(&tmp.path().join("sites/bad"), "{ \"id\": ");
    write_cfg(&tmp.path().join("sites/good"), "{}");
    write_cfg(&tmp.path().join("sites/dup"), r#"{"id": "good"}"#);
    let reg = Registry::init_with(tmp.path(), &no_env()).await.unwrap();
    assert_eq!(reg.ids().collect::<Vec<_>>(), vec!["sossbox", "good"]);
}

#[tokio::test]
async fn test_broken_main_config_is_fatal() {
    let tmp = tempfile::tempdir().unwrap();
    write_cfg(tmp.path(), "{ nope");
    assert!(Registry::init_with(tmp.path(), &no_env()).await.is_err());
}

#[tokio::test]
async fn test_sub_tenant_env_scope() {
    let tmp = tempfile::tempdir().unwrap();
    write_cfg(&tmp.path().join("sites/acme"), "{}");
    let env = EnvLookup::from_vars([("PORT", "5000"), ("SOSSBOX_ACME_PORT", "6000")]);
    let reg = Registry::init_with(tmp.path(), &env).await.unwrap();
    assert_eq!(reg.main().config().port, 5000);
    assert_eq!(reg.get("acme").unwrap().config().port, 6000);
}

#[tokio::test]
async fn test_iteration_helpers() {
    let tmp = tempfile::tempdir().unwrap();
    write_cfg(&tmp.path().join("sites/a"), "{}");
    write_cfg(&tmp.path().join("sites/b"), "{}");
    let reg = Registry::init_with(tmp.path(), &no_env()).await.unwrap();

    let mut seen = Vec::new();
    reg.for_each(|t| seen.push(t.id().to_string()));
    assert_eq!(seen, vec!["sossbox", "a", "b"]);

    let mut async_seen = Vec::new();
    reg.for_each_async(|t| {
        async_seen.push(t.id().to_string());
        async {}
    })
    .await;
    assert_eq!(async_seen, seen);

    let streamed: Vec<String> = reg.stream().map(|t| t.id().to_string()).collect().await;
    assert_eq!(streamed, seen);
    assert_eq!(reg.iter().count(), 3);
    assert!(!reg.is_empty());
}
