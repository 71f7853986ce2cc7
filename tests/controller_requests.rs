mod common;

use std::path::PathBuf;

use common::{drain, CountingSearch, FakeBackend, Harness};
use custom_minecraft_launcher::config::{Settings, SettingsPatch};
use custom_minecraft_launcher::controller::events::{LauncherEvent, Surface, SurfaceEvent};
use custom_minecraft_launcher::controller::{Request, Response};
use custom_minecraft_launcher::core::fs::version_manifest_path;
use custom_minecraft_launcher::core::java::JavaPathResult;
use custom_minecraft_launcher::core::settings::SettingsStore;
use custom_minecraft_launcher::ipc;
use tokio::io::AsyncReadExt;

#[tokio::test]
async fn cached_java_path_skips_the_search() {
    let harness = Harness::new(
        Some("/opt/java/bin/java"),
        FakeBackend::default(),
        CountingSearch::finding("/usr/lib/jvm/other"),
    );
    let controller = harness.controller();
    let mut sub = controller.subscribe();

    let response = controller.handle(Request::DetectJava).await;
    let expected = JavaPathResult::Success {
        path: PathBuf::from("/opt/java/bin/java"),
    };
    assert_eq!(
        response,
        Response::Java {
            result: expected.clone()
        }
    );
    assert_eq!(harness.search.calls(), 0);
    assert_eq!(drain(&mut sub), vec![LauncherEvent::JavaPathResult(expected)]);
}

#[tokio::test]
async fn found_java_is_remembered() {
    let harness = Harness::new(
        None,
        FakeBackend::default(),
        CountingSearch::finding("/usr/lib/jvm/java-17"),
    );
    let controller = harness.controller();

    let first = controller.handle(Request::DetectJava).await;
    let Response::Java {
        result: JavaPathResult::Success { path },
    } = first
    else {
        panic!("expected success, got {:?}", first);
    };
    assert!(path.starts_with("/usr/lib/jvm/java-17/bin"));

    let stored = harness.settings.get();
    assert_eq!(stored.java_path.as_ref(), Some(&path));
    assert!(stored.last_java_check_date.is_some());

    controller.handle(Request::DetectJava).await;
    assert_eq!(harness.search.calls(), 1);

    let reopened = SettingsStore::open(harness.settings_file(), Settings::default()).unwrap();
    assert_eq!(reopened.java_path(), Some(path));
}

#[tokio::test]
async fn failed_search_leaves_settings_untouched() {
    let harness = Harness::new(
        None,
        FakeBackend::default(),
        CountingSearch::failing("no java on PATH"),
    );
    let before = std::fs::read_to_string(harness.settings_file()).unwrap();
    let controller = harness.controller();

    let response = controller.handle(Request::DetectJava).await;
    match response {
        Response::Java {
            result: JavaPathResult::Error { message },
        } => {
            assert!(message.starts_with("Java not found."));
            assert!(message.contains("no java on PATH"));
        }
        other => panic!("expected error, got {:?}", other),
    }

    assert_eq!(harness.settings.java_path(), None);
    assert_eq!(std::fs::read_to_string(harness.settings_file()).unwrap(), before);
}

#[tokio::test]
async fn installed_check_follows_the_manifest() {
    let harness = Harness::with_java(FakeBackend::default());
    let controller = harness.controller();
    let ask = |version: &str| Request::IsVersionInstalled {
        version: version.to_string(),
    };

    assert_eq!(
        controller.handle(ask("1.18.2")).await,
        Response::Installed { installed: false }
    );

    let manifest = version_manifest_path(&harness.data_dir(), "1.18.2");
    std::fs::create_dir_all(manifest.parent().unwrap()).unwrap();
    std::fs::write(&manifest, "{}").unwrap();

    assert_eq!(
        controller.handle(ask("1.18.2")).await,
        Response::Installed { installed: true }
    );
    assert_eq!(
        controller.handle(ask("1.19")).await,
        Response::Installed { installed: false }
    );
    assert!(matches!(controller.handle(ask("")).await, Response::Error { .. }));
}

#[tokio::test]
async fn settings_round_trip_and_validation() {
    let harness = Harness::with_java(FakeBackend::default());
    let controller = harness.controller();

    let rejected = controller
        .handle(Request::SaveSettings(SettingsPatch {
            data_directory: None,
            max_memory_mb: Some(256),
        }))
        .await;
    assert!(matches!(rejected, Response::Error { .. }));
    assert_eq!(harness.settings.memory().max_memory_mb, 2048);

    let new_dir = harness.dir.path().join("elsewhere");
    let saved = controller
        .handle(Request::SaveSettings(SettingsPatch {
            data_directory: Some(new_dir.clone()),
            max_memory_mb: Some(4096),
        }))
        .await;
    assert_eq!(saved, Response::Ack);
    assert!(new_dir.is_dir());

    match controller.handle(Request::GetSettings).await {
        Response::Settings { settings } => {
            assert_eq!(settings.data_directory, new_dir);
            assert_eq!(settings.max_memory_mb, 4096);
        }
        other => panic!("unexpected {:?}", other),
    }

    let raw: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(harness.settings_file()).unwrap()).unwrap();
    assert_eq!(raw["launcherSettings"]["maxMemoryMB"], 4096);
    assert_eq!(raw["minecraftPath"], new_dir.display().to_string());
}

#[tokio::test]
async fn uncreatable_data_directory_is_not_saved() {
    let harness = Harness::with_java(FakeBackend::default());
    let controller = harness.controller();
    let before = harness.settings.get();

    let blocker = harness.dir.path().join("blocker");
    std::fs::write(&blocker, b"").unwrap();
    let response = controller
        .handle(Request::SaveSettings(SettingsPatch {
            data_directory: Some(blocker.join("minecraft")),
            max_memory_mb: Some(4096),
        }))
        .await;
    assert!(matches!(response, Response::Error { .. }), "{:?}", response);
    assert_eq!(harness.settings.get(), before);

    // A rejected patch does not create its directory either.
    let unused = harness.dir.path().join("unused");
    let response = controller
        .handle(Request::SaveSettings(SettingsPatch {
            data_directory: Some(unused.clone()),
            max_memory_mb: Some(256),
        }))
        .await;
    assert!(matches!(response, Response::Error { .. }));
    assert!(!unused.exists());
    assert_eq!(harness.settings.get(), before);
}

#[tokio::test]
async fn settings_surface_is_single_instance() {
    let harness = Harness::with_java(FakeBackend::default());
    let controller = harness.controller();
    let mut sub = controller.subscribe();

    controller.handle(Request::OpenSettings).await;
    controller.handle(Request::OpenSettings).await;
    assert!(controller.is_settings_open());
    controller.handle(Request::CloseSettings).await;
    controller.handle(Request::CloseSettings).await;

    assert_eq!(
        drain(&mut sub),
        vec![
            LauncherEvent::Surface(SurfaceEvent::Opened(Surface::Settings)),
            LauncherEvent::Surface(SurfaceEvent::Focused(Surface::Settings)),
            LauncherEvent::Surface(SurfaceEvent::Closed(Surface::Settings)),
        ]
    );
}

#[tokio::test]
async fn bootstrap_creates_the_data_directory() {
    let harness = Harness::with_java(FakeBackend::default());
    let controller = harness.controller();
    let mut sub = controller.subscribe();
    assert!(!harness.data_dir().exists());

    controller.bootstrap().await;

    assert!(harness.data_dir().is_dir());
    assert_eq!(
        drain(&mut sub),
        vec![LauncherEvent::Surface(SurfaceEvent::Opened(Surface::Main))]
    );
}

#[tokio::test]
async fn ipc_answers_each_line() {
    let harness = Harness::with_java(FakeBackend::default());
    let handle = harness.controller().spawn();

    let input = concat!(
        r#"{"id":1,"request":{"type":"isVersionInstalled","version":"1.18.2"}}"#,
        "\n",
        "not json\n",
        r#"{"id":2,"request":{"type":"chooseDirectory","title":"Pick"}}"#,
        "\n",
    );
    let (writer, mut reader) = tokio::io::duplex(64 * 1024);
    ipc::serve(handle, input.as_bytes(), writer).await.unwrap();

    let mut output = String::new();
    reader.read_to_string(&mut output).await.unwrap();
    let lines: Vec<serde_json::Value> = output
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .filter(|line: &serde_json::Value| line["kind"] == "response")
        .collect();
    assert_eq!(lines.len(), 3);

    let by_id = |id: serde_json::Value| {
        lines
            .iter()
            .find(|line| line["id"] == id)
            .cloned()
            .unwrap()
    };
    assert_eq!(
        by_id(serde_json::json!(1))["body"],
        serde_json::json!({"type": "installed", "installed": false})
    );
    assert_eq!(by_id(serde_json::Value::Null)["body"]["type"], "error");
    assert_eq!(by_id(serde_json::json!(2))["body"]["result"]["canceled"], true);
}

#[tokio::test]
async fn ipc_forwards_events_raised_by_requests() {
    let harness = Harness::with_java(FakeBackend::default());
    let handle = harness.controller().spawn();

    let input: &[u8] = b"{\"id\":7,\"request\":{\"type\":\"openSettings\"}}\n\xff\xfe\n";
    let (writer, mut reader) = tokio::io::duplex(64 * 1024);
    ipc::serve(handle, input, writer).await.unwrap();

    let mut output = String::new();
    reader.read_to_string(&mut output).await.unwrap();
    let lines: Vec<serde_json::Value> = output
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();

    let events: Vec<_> = lines.iter().filter(|l| l["kind"] == "event").collect();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["event"]["channel"], "surface");
    assert_eq!(
        events[0]["event"]["payload"],
        serde_json::json!({"type": "opened", "surface": "settings"})
    );

    let responses: Vec<_> = lines.iter().filter(|l| l["kind"] == "response").collect();
    assert_eq!(responses.len(), 2);
    assert!(responses
        .iter()
        .any(|r| r["id"] == 7 && r["body"]["type"] == "ack"));
    assert!(responses
        .iter()
        .any(|r| r["id"].is_null() && r["body"]["type"] == "error"));
}
