//! Usage output for the recognised help invocations.

use crate::common::{PROMPT, run_with_deadline, swt_command};
use rstest::rstest;

fn help_output(args: &[&str]) -> String {
    let mut cmd = swt_command();
    cmd.args(args);
    let finished = run_with_deadline(cmd, PROMPT);

    assert_eq!(finished.status.code(), Some(0), "{finished:?}");
    assert_eq!(finished.stderr, "");
    finished.stdout
}

#[cfg(unix)]
#[rstest]
#[case::no_args(&[])]
#[case::short(&["-h"])]
#[case::long(&["--help"])]
#[case::help_with_trailing_args(&["--help", "sh", "-c", "exit 1"])]
fn test_help(#[case] args: &[&str]) {
    let stdout = help_output(args);
    insta::allow_duplicates! {
        insta::assert_snapshot!(stdout, @r"
        Usage: startwaittree PROGRAM [ARGUMENT...]

        Starts a program with the given arguments and waits until it and all its descendants have terminated.
        ");
    }
}

#[cfg(unix)]
#[test]
fn test_usage_names_argv0_as_invoked() {
    let mut cmd = swt_command();
    std::os::unix::process::CommandExt::arg0(&mut cmd, "/opt/tools/startwaittree");
    let finished = run_with_deadline(cmd, PROMPT);

    assert_eq!(finished.status.code(), Some(0), "{finished:?}");
    assert!(
        finished
            .stdout
            .starts_with("Usage: /opt/tools/startwaittree PROGRAM [ARGUMENT...]\n"),
        "{}",
        finished.stdout
    );
}

#[cfg(unix)]
#[test]
fn test_double_dash_is_not_a_help_request() {
    // `--` is the target's argv[0], so it has to be looked up as a program.
    let mut cmd = swt_command();
    cmd.args(["--", "-h"]);
    let finished = run_with_deadline(cmd, PROMPT);

    assert_eq!(finished.status.code(), Some(1), "{finished:?}");
    assert_eq!(finished.stdout, "");
    assert!(
        finished
            .stderr
            .starts_with("startwaittree: execvp: failed to execute --: [2] "),
        "{}",
        finished.stderr
    );
}

#[cfg(windows)]
#[rstest]
#[case::no_args(&[])]
#[case::question(&["-?"])]
#[case::dash_h(&["-h"])]
#[case::dash_upper_h(&["-H"])]
#[case::slash_question(&["/?"])]
#[case::slash_h(&["/h"])]
#[case::slash_upper_h(&["/H"])]
fn test_help(#[case] args: &[&str]) {
    let stdout = help_output(args);
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines.len(), 3, "{stdout}");
    assert!(lines[0].starts_with("Usage: startwaittree"), "{stdout}");
    assert!(lines[1].is_empty());
    assert!(lines[2].starts_with("Starts a program"));
}

#[cfg(unix)]
#[test]
fn test_target_help_flags_are_passed_through() {
    let mut cmd = swt_command();
    cmd.args(["printf", "%s\\n", "-h", "--help"]);
    let finished = run_with_deadline(cmd, PROMPT);

    assert!(finished.status.success(), "{finished:?}");
    assert_eq!(finished.stdout, "-h\n--help\n");
}
