// tests/mutation_idempotence.rs

//! Applying any mutation twice must leave the filesystem exactly as one
//! application does.

use pvemirror::{MutationTarget, Outcome};
use regex::Regex;
use std::fs;

#[test]
fn overwrite_is_idempotent() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("pve-no-subscription.list");
    fs::write(&path, "deb https://enterprise.proxmox.com/debian/pve bookworm pve-enterprise\n")
        .unwrap();

    let target = MutationTarget::OverwriteWithTemplate {
        path: path.clone(),
        contents: "deb https://mirrors.ustc.edu.cn/proxmox/debian/pve bookworm pve-no-subscription\n"
            .to_string(),
    };

    assert_eq!(target.apply().unwrap(), Outcome::Applied);
    let after_first = fs::read_to_string(&path).unwrap();

    assert_eq!(target.apply().unwrap(), Outcome::Skipped);
    assert_eq!(fs::read_to_string(&path).unwrap(), after_first);
}

#[test]
fn overwrite_creates_missing_descriptor() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("ceph.list");

    let target = MutationTarget::OverwriteWithTemplate {
        path: path.clone(),
        contents: "deb https://mirrors.ustc.edu.cn/proxmox/debian/ceph-quincy bookworm no-subscription\n"
            .to_string(),
    };

    assert_eq!(target.apply().unwrap(), Outcome::Applied);
    assert!(path.exists());
}

#[test]
fn substitute_never_duplicates() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("sources.list");
    fs::write(
        &path,
        "deb http://deb.debian.org/debian bookworm main\n\
         deb http://deb.debian.org/debian bookworm-updates main\n",
    )
    .unwrap();

    let target = MutationTarget::SubstituteText {
        path: path.clone(),
        old: "deb.debian.org".to_string(),
        new: "mirrors.ustc.edu.cn".to_string(),
    };

    assert_eq!(target.apply().unwrap(), Outcome::Applied);
    let after_first = fs::read_to_string(&path).unwrap();
    assert_eq!(after_first.matches("mirrors.ustc.edu.cn").count(), 2);
    assert!(!after_first.contains("deb.debian.org"));

    // old text is gone, so the rerun must not touch the file
    assert_eq!(target.apply().unwrap(), Outcome::Skipped);
    assert_eq!(fs::read_to_string(&path).unwrap(), after_first);
}

#[test]
fn comment_out_never_double_comments() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("pve-enterprise.list");
    fs::write(
        &path,
        "# repo managed by subscription\n\
         deb https://enterprise.proxmox.com/debian/pve bookworm pve-enterprise\n",
    )
    .unwrap();

    let target = MutationTarget::CommentOutLines {
        path: path.clone(),
        pattern: Regex::new(r"^\s*deb").unwrap(),
    };

    assert_eq!(target.apply().unwrap(), Outcome::Applied);
    let after_first = fs::read_to_string(&path).unwrap();
    assert_eq!(
        after_first,
        "# repo managed by subscription\n\
         # deb https://enterprise.proxmox.com/debian/pve bookworm pve-enterprise\n"
    );

    assert_eq!(target.apply().unwrap(), Outcome::Skipped);
    assert_eq!(fs::read_to_string(&path).unwrap(), after_first);
}

#[test]
fn rename_tolerates_already_disabled() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("pve-enterprise.sources");
    fs::write(&path, "Types: deb\n").unwrap();

    let target = MutationTarget::RenameToDisabled {
        path: path.clone(),
        suffix: ".disabled".to_string(),
    };

    assert_eq!(target.apply().unwrap(), Outcome::Applied);
    let disabled = temp.path().join("pve-enterprise.sources.disabled");
    assert!(!path.exists());
    assert!(disabled.exists());

    // source is gone now; the rerun is a no-op, not an error
    assert_eq!(target.apply().unwrap(), Outcome::Skipped);
    assert!(disabled.exists());
}

#[test]
fn editing_kinds_skip_missing_files() {
    let temp = tempfile::tempdir().unwrap();
    let missing = temp.path().join("not-there.list");

    let substitute = MutationTarget::SubstituteText {
        path: missing.clone(),
        old: "a".to_string(),
        new: "b".to_string(),
    };
    let comment = MutationTarget::CommentOutLines {
        path: missing.clone(),
        pattern: Regex::new(r"^deb").unwrap(),
    };
    let rename = MutationTarget::RenameToDisabled {
        path: missing.clone(),
        suffix: ".disabled".to_string(),
    };

    assert_eq!(substitute.apply().unwrap(), Outcome::Skipped);
    assert_eq!(comment.apply().unwrap(), Outcome::Skipped);
    assert_eq!(rename.apply().unwrap(), Outcome::Skipped);
    assert!(!missing.exists());
}
