//! Static per-service rules: which entries a service owns and which update
//! hooks apply to it.
//!
//! # Design
//! - The service-type string is matched once, exactly and case-sensitively.
//! - Targets and hooks are data on the variant, not branches in the pipeline.
//! - The backup root is never in scope, whatever the profile says.

use crate::backup::BACKUP_DIR_NAME;

const MIHOMO_TARGETS: &[&str] = &["providers", "ruleset"];
const MOSDNS_TARGETS: &[&str] = &["rules"];

const MIHOMO_HOOKS: &[Hook] = &[
    Hook::ListenerRewrite,
    Hook::Directories,
    Hook::ProviderDownloads,
    Hook::RulesetDownloads,
];
const MOSDNS_HOOKS: &[Hook] = &[
    Hook::CacheSeed,
    Hook::Directories,
    Hook::CustomFiles,
    Hook::RulesetDownloads,
    Hook::OwnershipFixup,
];

/// Managed service families with distinct update behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceProfile {
    /// Traffic-routing proxy.
    Mihomo,
    /// DNS filter.
    MosDns,
    /// Any other service: whole-directory backup, no hooks.
    Other,
}

/// Optional update steps a profile may enable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hook {
    /// Rewrite listener addresses in the incoming document.
    ListenerRewrite,
    /// Seed an empty `cache.dump` in the config directory.
    CacheSeed,
    /// Create requested directories.
    Directories,
    /// Write literal custom files.
    CustomFiles,
    /// Fetch provider artifacts.
    ProviderDownloads,
    /// Fetch rule-set artifacts.
    RulesetDownloads,
    /// Reassign the config tree to the agent's uid/gid before commit.
    OwnershipFixup,
}

impl Hook {
    /// Stable label for structured logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ListenerRewrite => "listener_rewrite",
            Self::CacheSeed => "cache_seed",
            Self::Directories => "directories",
            Self::CustomFiles => "custom_files",
            Self::ProviderDownloads => "provider_downloads",
            Self::RulesetDownloads => "ruleset_downloads",
            Self::OwnershipFixup => "ownership_fixup",
        }
    }
}

/// Entries of the config directory that a backup copies and then removes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackupScope {
    /// Only entries whose basename is listed.
    Named(Vec<String>),
    /// Every entry except the backup root.
    Everything,
}

impl BackupScope {
    /// Whether the entry called `name` is in scope.
    #[must_use]
    pub fn includes(&self, name: &str) -> bool {
        if name == BACKUP_DIR_NAME {
            return false;
        }
        match self {
            Self::Named(targets) => targets.iter().any(|target| target == name),
            Self::Everything => true,
        }
    }
}

impl ServiceProfile {
    /// Resolve a service-type identifier.
    #[must_use]
    pub fn resolve(service_type: &str) -> Self {
        match service_type {
            "mihomo" => Self::Mihomo,
            "mosdns" => Self::MosDns,
            _ => Self::Other,
        }
    }

    /// Stable label for structured logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Mihomo => "mihomo",
            Self::MosDns => "mosdns",
            Self::Other => "other",
        }
    }

    /// Backup/clean scope; `config_file_name` is the managed file's basename.
    #[must_use]
    pub fn backup_scope(self, config_file_name: &str) -> BackupScope {
        let fixed = match self {
            Self::Mihomo => MIHOMO_TARGETS,
            Self::MosDns => MOSDNS_TARGETS,
            Self::Other => return BackupScope::Everything,
        };
        let mut targets: Vec<String> = fixed.iter().map(|name| (*name).to_string()).collect();
        if !config_file_name.is_empty() {
            targets.push(config_file_name.to_string());
        }
        BackupScope::Named(targets)
    }

    /// Hooks enabled for this profile, in execution order.
    #[must_use]
    pub const fn hooks(self) -> &'static [Hook] {
        match self {
            Self::Mihomo => MIHOMO_HOOKS,
            Self::MosDns => MOSDNS_HOOKS,
            Self::Other => &[],
        }
    }

    /// Whether `hook` applies to this profile.
    #[must_use]
    pub fn enables(self, hook: Hook) -> bool {
        self.hooks().contains(&hook)
    }
}
