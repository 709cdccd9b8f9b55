use assert_cmd::Command;
use tempfile::TempDir;

fn write_config(dir: &TempDir, views: &str) -> anyhow::Result<String> {
    let path = dir.path().join("views.toml");
    let toml = format!(
        r#"
listen_udp = "127.0.0.1:0"
listen_tcp = "127.0.0.1:0"
upstreams = ["127.0.0.1:53"]

[views]
{views}
"#
    );
    std::fs::write(&path, toml)?;
    Ok(path.to_string_lossy().into_owned())
}

#[test]
fn refuses_to_start_without_record_source() -> anyhow::Result<()> {
    let tmp = TempDir::new()?;
    let cfg = write_config(&tmp, r#"clients = "clients.yaml""#)?;

    Command::cargo_bin("rust-dns-views")?
        .args(["--config", &cfg])
        .assert()
        .failure();
    Ok(())
}

#[test]
fn refuses_to_start_when_first_load_fails() -> anyhow::Result<()> {
    let tmp = TempDir::new()?;
    let clients = tmp.path().join("clients.yaml");
    std::fs::write(&clients, "- name: internal\n  prefixes: [100.64.0.0/10]\n")?;
    let missing = tmp.path().join("no-such-records.yaml");

    let cfg = write_config(
        &tmp,
        &format!(
            "clients = {:?}\nrecords = {:?}",
            clients.to_string_lossy(),
            missing.to_string_lossy()
        ),
    )?;

    Command::cargo_bin("rust-dns-views")?
        .args(["--config", &cfg])
        .assert()
        .failure();
    Ok(())
}
