//! Authorization predicates over file ownership and share state.

use crate::error::{DriveError, Result};
use crate::storage::models::FileRecord;

/// What the requester intends to do with a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Read,
    Write,
}

/// Owners may read their files; anyone, including anonymous requesters, may
/// read a shared file.
pub fn can_read(requester: Option<&str>, file: &FileRecord, op: Operation) -> bool {
    is_owner(requester, file) || (op == Operation::Read && file.is_shared())
}

pub fn can_write(requester: Option<&str>, file: &FileRecord) -> bool {
    is_owner(requester, file)
}

/// Enforce `op` on `file`.
///
/// A file the requester can neither own nor see through a share is reported as
/// `NotFound`; a visible file the requester may not modify is `Forbidden`.
pub fn check(requester: Option<&str>, file: &FileRecord, op: Operation) -> Result<()> {
    let allowed = match op {
        Operation::Read => can_read(requester, file, op),
        Operation::Write => can_write(requester, file),
    };
    if allowed {
        return Ok(());
    }
    if file.is_shared() {
        Err(DriveError::Forbidden(
            "Only the owner can modify this file".to_string(),
        ))
    } else {
        Err(DriveError::NotFound("File"))
    }
}

fn is_owner(requester: Option<&str>, file: &FileRecord) -> bool {
    requester.is_some_and(|user| user == file.owner)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(shared: bool) -> FileRecord {
        let mut file = FileRecord::new("notes.txt", "alice", None, "k.txt", 5);
        if shared {
            file.share_token = Some("tok".to_string());
        }
        file
    }

    #[test]
    fn owner_reads_and_writes() {
        let f = file(false);
        assert!(can_read(Some("alice"), &f, Operation::Read));
        assert!(can_write(Some("alice"), &f));
        assert!(check(Some("alice"), &f, Operation::Write).is_ok());
    }

    #[test]
    fn shared_file_is_read_only_for_others() {
        let f = file(true);
        assert!(can_read(Some("bob"), &f, Operation::Read));
        assert!(can_read(None, &f, Operation::Read));
        assert!(!can_read(Some("bob"), &f, Operation::Write));
        assert!(!can_write(Some("bob"), &f));
        assert!(matches!(
            check(Some("bob"), &f, Operation::Write),
            Err(DriveError::Forbidden(_))
        ));
    }

    #[test]
    fn private_file_is_invisible_to_others() {
        let f = file(false);
        assert!(!can_read(Some("bob"), &f, Operation::Read));
        assert!(!can_read(None, &f, Operation::Read));
        assert!(matches!(
            check(Some("bob"), &f, Operation::Read),
            Err(DriveError::NotFound(_))
        ));
        assert!(matches!(
            check(None, &f, Operation::Write),
            Err(DriveError::NotFound(_))
        ));
    }
}
