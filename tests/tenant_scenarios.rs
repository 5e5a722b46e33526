use std::sync::Arc;

use serde_json::{json, Map};
use sossbox::config::{EnvLookup, CONFIG_FILE};
use sossbox::store::{Credentials, UserProfile};
use sossbox::Registry;

fn no_env() -> EnvLookup { EnvLookup::from_vars(Vec::<(String, String)>::new()) }

#[tokio::test]
async fn site_scenario_create_and_duplicate_login() {
    let site = tempfile::tempdir().unwrap();
    std::fs::write(site.path().join(CONFIG_FILE), r#"{"id":"acme","secret":"s3cr3t","registration":true}"#).unwrap();
    let reg = Registry::init_with(site.path(), &no_env()).await.unwrap();
    let acme = reg.get("acme").unwrap();
    assert_eq!(acme.config().secret, "s3cr3t");
    assert!(acme.config().registration);

    let rec = acme.user_create(Credentials::from_hash("abc"), UserProfile::new("u1", "bob")).await.unwrap().unwrap();
    let meta_path = site.path().join("data/users/u1/meta.json");
    assert_eq!(
        std::fs::read_to_string(&meta_path).unwrap(),
        r#"{"credentials":{"hash":"abc"},"user":{"uid":"u1","login":"bob"}}"#
    );
    assert_eq!(std::fs::read_link(site.path().join("data/logins/bob")).unwrap(), site.path().join("data/users/u1"));

    let again = acme.user_create(Credentials::from_hash("other"), UserProfile::new("u2", "bob")).await.unwrap();
    assert!(again.is_none());
    assert_eq!(acme.user_by_uid("u1").await.unwrap().unwrap(), rec);
    assert_eq!(acme.user_by_login("bob").await.unwrap().unwrap(), rec);
    assert!(!site.path().join("data/users/u2").exists());
}

#[tokio::test]
async fn lookups_agree_for_many_users() {
    let site = tempfile::tempdir().unwrap();
    let reg = Registry::init_with(site.path(), &no_env()).await.unwrap();
    let store = reg.main();
    for i in 0..8 {
        let uid = sossbox::store::new_uid();
        let login = format!("user{}", i);
        let profile = UserProfile::new(&uid, &login).with_field("n", json!(i));
        store.user_create(Credentials::from_hash(format!("h{}", i)), profile).await.unwrap().unwrap();
        let by_uid = store.user_by_uid(&uid).await.unwrap().unwrap();
        let by_login = store.user_by_login(&login).await.unwrap().unwrap();
        assert_eq!(by_uid, by_login);
        assert_eq!(by_login.user.fields.get("n"), Some(&json!(i)));
    }
}

#[tokio::test]
async fn delete_clears_both_lookup_paths() {
    let site = tempfile::tempdir().unwrap();
    let reg = Registry::init_with(site.path(), &no_env()).await.unwrap();
    let store = reg.main();
    store.user_create(Credentials::from_hash("abc"), UserProfile::new("u1", "bob")).await.unwrap().unwrap();
    store.user_doc_create("u1", "projects", "p1", &json!({"title": "Demo"})).await.unwrap();
    assert!(store.user_delete("u1").await.unwrap());
    assert!(store.user_by_uid("u1").await.unwrap().is_none());
    assert!(store.user_by_login("bob").await.unwrap().is_none());
    assert!(!site.path().join("data/users/u1").exists());
}

#[tokio::test]
async fn documents_roundtrip_and_merge_shallowly() {
    let site = tempfile::tempdir().unwrap();
    let reg = Registry::init_with(site.path(), &no_env()).await.unwrap();
    let store = reg.main();
    store.user_create(Credentials::from_hash("abc"), UserProfile::new("u1", "bob")).await.unwrap().unwrap();

    let payload = json!({"title": "Demo", "meta": {"color": "red", "size": 3}, "b": true});
    store.user_doc_create("u1", "projects", "p1", &payload).await.unwrap();
    assert_eq!(store.user_doc_get("u1", "projects", "p1").await.unwrap(), Some(payload));
    assert!(store.user_list_docs("u1", "projects").await.unwrap().unwrap().contains(&"p1".to_string()));

    let mut upd = Map::new();
    upd.insert("title".into(), json!("Renamed"));
    upd.insert("meta".into(), json!({"color": "blue"}));
    store.user_doc_update("u1", "projects", "p1", &upd).await.unwrap();
    let doc = store.user_doc_get("u1", "projects", "p1").await.unwrap().unwrap();
    assert_eq!(doc, json!({"title": "Renamed", "meta": {"color": "blue"}, "b": true}));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_creates_for_one_login_admit_exactly_one() {
    let site = tempfile::tempdir().unwrap();
    let reg = Arc::new(Registry::init_with(site.path(), &no_env()).await.unwrap());
    let mut handles = Vec::new();
    for i in 0..16 {
        let reg = reg.clone();
        handles.push(tokio::spawn(async move {
            let store = reg.main().clone();
            store.user_create(Credentials::from_hash("abc"), UserProfile::new(format!("u{}", i), "bob")).await
        }));
    }
    let mut winners = Vec::new();
    for h in handles {
        if let Some(rec) = h.await.unwrap().unwrap() {
            winners.push(rec.user.uid);
        }
    }
    assert_eq!(winners.len(), 1);
    let users = reg.main().folder_get("users").await.unwrap().unwrap();
    assert_eq!(users, winners);
    let by_login = reg.main().user_by_login("bob").await.unwrap().unwrap();
    assert_eq!(by_login.user.uid, winners[0]);
}

#[tokio::test]
async fn sub_tenants_are_isolated() {
    let root = tempfile::tempdir().unwrap();
    for id in ["one", "two"] {
        let dir = root.path().join("sites").join(id);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(CONFIG_FILE), "{}").unwrap();
    }
    let reg = Registry::init_with(root.path(), &no_env()).await.unwrap();
    let one = reg.get("one").unwrap();
    let two = reg.get("two").unwrap();
    one.user_create(Credentials::from_hash("abc"), UserProfile::new("u1", "bob")).await.unwrap().unwrap();
    assert!(two.user_by_login("bob").await.unwrap().is_none());
    assert!(two.user_create(Credentials::from_hash("abc"), UserProfile::new("u1", "bob")).await.unwrap().is_some());
    assert!(reg.main().user_by_uid("u1").await.unwrap().is_none());
}
