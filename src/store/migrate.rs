use crate::store::{Store, StoreError};

const VERSION_KEY: &str = "_meta:version";

type MigrationFn = fn(&Store) -> Result<(), StoreError>;

fn migrations() -> Vec<(&'static str, MigrationFn)> {
    vec![("001_initial", m001_initial)]
}

/// 执行所有未应用的数据库迁移。
///
/// 每个迁移函数必须幂等：迁移可能在 func() 成功但 set_version() 之前
/// 因进程崩溃而中断，重启后会重新执行该迁移。
pub fn run(store: &Store) -> Result<(), StoreError> {
    let current = get_current_version(store)?;
    let all = migrations();

    for (index, (name, func)) in all.iter().enumerate() {
        let version = (index + 1) as u32;
        if version > current {
            tracing::info!(version, name, "Running migration");
            func(store)?;
            set_version(store, version)?;
            tracing::info!(version, name, "Migration complete");
        } else {
            tracing::debug!(version, name, "Migration already applied, skipping");
        }
    }

    Ok(())
}

pub fn get_current_version(store: &Store) -> Result<u32, StoreError> {
    match store.config_versions.get(VERSION_KEY.as_bytes())? {
        Some(raw) => {
            let bytes: [u8; 4] = raw.as_ref().try_into().unwrap_or([0; 4]);
            Ok(u32::from_be_bytes(bytes))
        }
        None => Ok(0),
    }
}

fn set_version(store: &Store, version: u32) -> Result<(), StoreError> {
    let current = get_current_version(store)?;
    if version < current {
        return Err(StoreError::Migration {
            version,
            message: format!("refusing to downgrade from version {current}"),
        });
    }
    store
        .config_versions
        .insert(VERSION_KEY.as_bytes(), &version.to_be_bytes())?;
    Ok(())
}

/// Trees are created lazily by `Store::open`; the initial migration only
/// pins the schema version so later migrations have a baseline.
fn m001_initial(_store: &Store) -> Result<(), StoreError> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_are_idempotent() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let store = Store::open(tmp.path().join("migrate.sled").to_str().unwrap()).unwrap();

        run(&store).unwrap();
        let v1 = get_current_version(&store).unwrap();
        run(&store).unwrap();
        let v2 = get_current_version(&store).unwrap();

        assert_eq!(v1, migrations().len() as u32);
        assert_eq!(v1, v2);
    }
}
