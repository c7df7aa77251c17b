#![allow(missing_docs, clippy::unwrap_used)]

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::tempdir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn write_config(dir: &Path, sources: &[String], gzip: bool) -> PathBuf {
    let source_list = sources
        .iter()
        .map(|s| format!("\"{s}\""))
        .collect::<Vec<_>>()
        .join(", ");
    let config = format!(
        "sources = [{source_list}]\n\n\
         [output]\n\
         dir = \"{}\"\n\
         filename = \"merged.xml\"\n\
         gzip = {gzip}\n\n\
         [paths]\n\
         cache_dir = \"{}\"\n",
        dir.join("output").display(),
        dir.join("cache").display()
    );
    let config_path = dir.join("epgmerge.toml");
    fs::write(&config_path, config).unwrap();
    config_path
}

async fn mount_source(server: &MockServer, route: &str, body: &str) {
    Mock::given(method("GET"))
        .and(path(route.to_string()))
        .respond_with(ResponseTemplate::new(200).set_body_string(body.to_string()))
        .mount(server)
        .await;
}

const SOURCE_A: &str = r#"<tv>
  <channel id="A&amp;E.us"><display-name>A&amp;E</display-name></channel>
  <programme channel="A&E.us" start="20230507120000 +0000" stop="20230507130000 +0000">
    <title>First Bio</title>
  </programme>
  <programme channel="A&amp;E.us" start="20230507140000 +5:30" stop="20230507150000 +5:30">
    <title>Tz Fix</title>
  </programme>
  <programme channel="A&amp;E.us" start="20230507180000 +0000" stop="20230507170000 +0000">
    <title>Inverted</title>
  </programme>
  <programme channel="ghost.example" start="20230507120000 +0000" stop="20230507130000 +0000">
    <title>Orphan</title>
  </programme>
</tv>"#;

const SOURCE_B: &str = r#"<tv>
  <channel id="A&E.us"><display-name>Duplicate</display-name></channel>
  <channel id="b.example"><display-name>B</display-name></channel>
  <programme channel="A&E.us" start="20230507120000 +0000" stop="20230507130000 +0000">
    <title>Second Bio</title>
  </programme>
  <programme channel="b.example" start="20230507120000 +0000" stop="20230507130000 +0000">
    <title>B Show</title>
  </programme>
</tv>"#;

#[tokio::test]
async fn merge_normalizes_and_dedupes_end_to_end() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    mount_source(&server, "/a.xml", SOURCE_A).await;
    mount_source(&server, "/b.xml", SOURCE_B).await;

    let tmp = tempdir()?;
    let config_path = write_config(
        tmp.path(),
        &[
            format!("{}/a.xml", server.uri()),
            format!("{}/b.xml", server.uri()),
        ],
        false,
    );

    assert_cmd::Command::cargo_bin("epgmerge")?
        .args(["merge", "--config"])
        .arg(&config_path)
        .assert()
        .success();

    let output = fs::read_to_string(tmp.path().join("output/merged.xml"))?;

    // Channel uniqueness: the first source owns the A&E identity.
    assert_eq!(output.matches("<channel id=\"A&amp;E.us\">").count(), 1);
    assert!(!output.contains("Duplicate"));
    assert!(output.contains("b.example"));

    // Referential integrity: refs rewritten to the canonical literal id.
    assert!(output.contains("channel=\"A&amp;E.us\""));
    assert!(!output.contains("channel=\"A&E.us\""));

    // Collision resolution: the first-seen programme wins its start slot.
    assert!(output.contains("First Bio"));
    assert!(!output.contains("Second Bio"));

    // Timezone canonicalization.
    assert!(output.contains("+0530"));
    assert!(!output.contains("+5:30"));

    // Chronology and orphan pruning.
    assert!(!output.contains("Inverted"));
    assert!(!output.contains("Orphan"));

    // Provenance stamps on the root element.
    assert!(output.starts_with("<?xml version=\"1.0\" encoding=\"utf-8\"?>"));
    assert!(output.contains("generator-info-name=\"epgmerge/"));
    assert!(output.contains("generated-ts=\""));

    Ok(())
}

#[tokio::test]
async fn partial_source_failure_is_reported_not_fatal() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    mount_source(&server, "/a.xml", SOURCE_A).await;
    Mock::given(method("GET"))
        .and(path("/down.xml"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    mount_source(&server, "/b.xml", SOURCE_B).await;

    let tmp = tempdir()?;
    let config_path = write_config(
        tmp.path(),
        &[
            format!("{}/a.xml", server.uri()),
            format!("{}/down.xml", server.uri()),
            format!("{}/b.xml", server.uri()),
        ],
        false,
    );

    let assert = assert_cmd::Command::cargo_bin("epgmerge")?
        .args(["merge", "--config"])
        .arg(&config_path)
        .assert()
        .success();

    let stdout = String::from_utf8_lossy(&assert.get_output().stdout).into_owned();
    assert!(stdout.contains("skipped"), "summary should report the skip: {stdout}");

    let output = fs::read_to_string(tmp.path().join("output/merged.xml"))?;
    assert!(output.contains("A&amp;E.us"));
    assert!(output.contains("b.example"));

    Ok(())
}

#[tokio::test]
async fn gzip_output_is_the_default() -> anyhow::Result<()> {
    use flate2::read::GzDecoder;
    use std::io::Read;

    let server = MockServer::start().await;
    mount_source(&server, "/a.xml", SOURCE_A).await;

    let tmp = tempdir()?;
    let config_path = write_config(tmp.path(), &[format!("{}/a.xml", server.uri())], true);

    assert_cmd::Command::cargo_bin("epgmerge")?
        .args(["merge", "--config"])
        .arg(&config_path)
        .assert()
        .success();

    let gz_path = tmp.path().join("output/merged.xml.gz");
    let mut decoder = GzDecoder::new(fs::File::open(&gz_path)?);
    let mut output = String::new();
    decoder.read_to_string(&mut output)?;
    assert!(output.contains("A&amp;E.us"));

    Ok(())
}

#[tokio::test]
async fn no_gzip_flag_overrides_config() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    mount_source(&server, "/a.xml", SOURCE_A).await;

    let tmp = tempdir()?;
    let config_path = write_config(tmp.path(), &[format!("{}/a.xml", server.uri())], true);

    assert_cmd::Command::cargo_bin("epgmerge")?
        .args(["merge", "--no-gzip", "--config"])
        .arg(&config_path)
        .assert()
        .success();

    let output = fs::read_to_string(tmp.path().join("output/merged.xml"))?;
    assert!(output.starts_with("<?xml"));

    Ok(())
}

#[tokio::test]
async fn clear_wipes_cached_artifacts() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    mount_source(&server, "/a.xml", SOURCE_A).await;

    let tmp = tempdir()?;
    let config_path = write_config(tmp.path(), &[format!("{}/a.xml", server.uri())], false);

    // Populate the cache with a merge run.
    assert_cmd::Command::cargo_bin("epgmerge")?
        .args(["merge", "--config"])
        .arg(&config_path)
        .assert()
        .success();
    let cache_dir = tmp.path().join("cache");
    assert!(fs::read_dir(&cache_dir)?.next().is_some());

    // Without --force the command refuses.
    assert_cmd::Command::cargo_bin("epgmerge")?
        .args(["clear", "--config"])
        .arg(&config_path)
        .assert()
        .failure();
    assert!(fs::read_dir(&cache_dir)?.next().is_some());

    assert_cmd::Command::cargo_bin("epgmerge")?
        .args(["clear", "--force", "--config"])
        .arg(&config_path)
        .assert()
        .success();
    assert!(fs::read_dir(&cache_dir)?.next().is_none());

    Ok(())
}

#[tokio::test]
async fn missing_config_is_fatal() -> anyhow::Result<()> {
    let tmp = tempdir()?;

    assert_cmd::Command::cargo_bin("epgmerge")?
        .args(["merge", "--config"])
        .arg(tmp.path().join("does-not-exist.toml"))
        .assert()
        .failure();

    Ok(())
}
