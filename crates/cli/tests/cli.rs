use assert_cmd::Command;

#[test]
fn help_lists_subcommands() {
    let output = Command::cargo_bin("biblioteca")
        .unwrap()
        .arg("--help")
        .output()
        .unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    for name in ["serve", "migrate", "generar-reportes", "flush-expired-tokens"] {
        assert!(stdout.contains(name), "missing subcommand {name}");
    }
}

#[test]
fn unknown_subcommand_fails() {
    Command::cargo_bin("biblioteca")
        .unwrap()
        .arg("prestar")
        .assert()
        .failure();
}
