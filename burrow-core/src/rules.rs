//! The triage rule table: categorisation patterns, the finding catalog and
//! the context heuristics. Bump `RULESET_VERSION` whenever an entry changes.

use crate::data::Severity;
use burrow_scanner::{Technology, UrlCategory};
use once_cell::sync::Lazy;
use regex::Regex;

pub const RULESET_VERSION: &str = "2026.10.1";

/// Ordered path patterns, first match wins. URLs matching none fall back to
/// root / top-level / other by depth.
pub static CATEGORY_RULES: Lazy<Vec<(UrlCategory, Regex)>> = Lazy::new(|| {
    [
        (
            UrlCategory::Admin,
            r"(?i)/(admin|administrator|wp-admin|phpmyadmin|pma|adminer|manager|dashboard|console|cpanel|backend)(/|$|\.)",
        ),
        (
            UrlCategory::Api,
            r"(?i)/(api|graphql|rest|rpc|jsonrpc|wp-json|odata|v[0-9]+)(/|$|\.)",
        ),
        (
            UrlCategory::Config,
            r"(?i)(/\.(git|svn|hg|env|aws|htaccess|htpasswd|ds_store|npmrc)|web\.config|/config\.|/settings\.|\.(env|ini|conf|cfg|ya?ml|toml|properties)$)",
        ),
        (
            UrlCategory::Auth,
            r"(?i)/(login|logout|signin|signup|register|auth|oauth|sso|session|password|wp-login)(/|$|\.)",
        ),
        (
            UrlCategory::Docs,
            r"(?i)/(docs?|documentation|swagger|swagger-ui|openapi|api-docs|redoc|help|manual|readme)(/|$|\.)",
        ),
        (
            UrlCategory::Dev,
            r"(?i)/(dev|test|tests|staging|debug|phpinfo|info\.php|server-status|server-info|actuator|__debug__|trace|beta|sandbox)(/|$|\.)",
        ),
        (
            UrlCategory::Static,
            r"(?i)(/(static|assets|css|js|images|img|fonts|media|dist)/|\.(css|js|map|ico|svg|png|jpe?g|gif|woff2?)$)",
        ),
        (
            UrlCategory::Application,
            r"(?i)\.(php|aspx?|jsp|do|action|cgi|pl|py|rb)$",
        ),
    ]
    .into_iter()
    .map(|(category, pattern)| (category, Regex::new(pattern).unwrap()))
    .collect()
});

pub struct FindingRule {
    pub finding_type: &'static str,
    pub severity: Severity,
    pub pattern: Regex,
    pub reason: &'static str,
    /// Exact matches on the most valuable exposures get a confidence bonus.
    pub high_value: bool,
}

/// Severity-ordered catalog. Evaluated against the lowercased path; the
/// first matching rule is the only catalog finding for a URL.
pub static FINDING_CATALOG: Lazy<Vec<FindingRule>> = Lazy::new(|| {
    [
        ("git_repository", Severity::Critical, r"/\.git(/|$)", "Git repository exposed", true),
        ("environment_file", Severity::Critical, r"/\.env(\.[a-z]+)?$", "Environment file exposed", true),
        ("credentials_file", Severity::Critical, r"/(\.aws/credentials|\.htpasswd|\.npmrc)$", "Credentials file exposed", true),
        ("database_dump", Severity::Critical, r"\.(sql|sqlite|db)(\.gz)?$", "Database dump accessible", true),
        ("heap_dump", Severity::Critical, r"/(actuator/)?heapdump$", "JVM heap dump accessible", true),
        ("vcs_metadata", Severity::High, r"/\.(svn|hg)(/|$)", "Version control metadata exposed", false),
        ("config_file", Severity::High, r"(/web\.config|/wp-config\.php|/configuration\.php|/config\.(php|json|ya?ml)|/settings\.py|/\.htaccess)(\.bak|\.old|~)?$", "Configuration file exposed", false),
        ("backup_file", Severity::High, r"\.(bak|backup|old|orig|swp|tar|tgz|tar\.gz|zip)$", "Backup or archive file accessible", false),
        ("admin_panel", Severity::High, r"/(admin|administrator|wp-admin|phpmyadmin|pma|adminer|manager/html|host-manager|cpanel)(/|$|\.php)", "Admin panel discovered", false),
        ("debug_endpoint", Severity::High, r"/(phpinfo\.php|info\.php|server-status|server-info|__debug__|elmah\.axd|trace\.axd|actuator/(env|mappings|trace)|rails/info)(/|$)", "Debug or diagnostic endpoint exposed", false),
        ("ds_store", Severity::Medium, r"/\.ds_store$", "macOS directory metadata exposed", false),
        ("api_documentation", Severity::Medium, r"/(swagger(-ui)?(\.html|\.json)?|openapi\.json|api-docs|graphiql|graphql)(/|$)", "API documentation or schema exposed", false),
        ("actuator_endpoint", Severity::Medium, r"/actuator(/|$)", "Spring actuator endpoint exposed", false),
        ("login_page", Severity::Medium, r"/(login|signin|wp-login\.php|user/login|users/sign_in|auth|sso)(/|$|\.php)", "Authentication page discovered", false),
        ("log_file", Severity::Medium, r"\.log$", "Log file accessible", false),
        ("api_endpoint", Severity::Low, r"/(api|rest)(/|$)", "API endpoint discovered", false),
        ("robots_file", Severity::Low, r"/robots\.txt$", "robots.txt present", false),
        ("sitemap_file", Severity::Low, r"/sitemap\.xml$", "Sitemap present", false),
        ("crossdomain_policy", Severity::Low, r"/(crossdomain|clientaccesspolicy)\.xml$", "Cross-domain policy file present", false),
        ("health_endpoint", Severity::Low, r"/(health|status|metrics|version)(/|$)", "Health or status endpoint exposed", false),
        ("security_txt", Severity::Info, r"/security\.txt$", "security.txt present", false),
        ("readme_file", Severity::Info, r"/(readme|changelog|humans)(\.(md|txt|html))?$", "Informational file present", false),
    ]
    .into_iter()
    .map(|(finding_type, severity, pattern, reason, high_value)| FindingRule {
        finding_type,
        severity,
        pattern: Regex::new(pattern).unwrap(),
        reason,
        high_value,
    })
    .collect()
});

/// Query parameter names worth a closer look: (finding type, severity,
/// names, reason). Names are compared lowercased.
pub const PARAMETER_RULES: &[(&str, Severity, &[&str], &str)] = &[
    (
        "file_parameter",
        Severity::High,
        &["file", "filename", "path", "filepath", "dir", "folder", "include", "template", "doc", "document"],
        "File or path parameter (possible traversal or inclusion)",
    ),
    (
        "debug_parameter",
        Severity::High,
        &["debug", "admin", "test", "dev", "trace", "verbose"],
        "Debug or privilege toggle parameter",
    ),
    (
        "redirect_parameter",
        Severity::Medium,
        &["url", "redirect", "redirect_uri", "redirect_url", "return", "return_url", "returnurl", "next", "dest", "destination", "callback", "goto"],
        "URL or redirect parameter (possible open redirect or SSRF)",
    ),
    (
        "identifier_parameter",
        Severity::Medium,
        &["id", "uid", "user_id", "userid", "account", "account_id", "order_id", "doc_id"],
        "Object identifier parameter (possible IDOR)",
    ),
];

/// Directory name fragments: (fragment, severity). A segment matches when it
/// equals the fragment or its plural.
pub const SENSITIVE_DIRECTORIES: &[(&str, Severity)] = &[
    ("backup", Severity::High),
    ("bak", Severity::High),
    ("old", Severity::Medium),
    ("tmp", Severity::Medium),
    ("temp", Severity::Medium),
    ("cache", Severity::Medium),
    ("log", Severity::Medium),
    ("upload", Severity::Medium),
];

/// Path segments that mark generic, low-value content.
pub const LOW_VALUE_SEGMENTS: &[&str] = &["test", "tests", "help", "docs", "doc"];

/// Path-based technology evidence, complementing response fingerprints.
pub static TECHNOLOGY_PATH_RULES: Lazy<Vec<(Regex, Technology)>> = Lazy::new(|| {
    [
        (r"(?i)/wp-(admin|content|includes|login\.php|json)", Technology::WordPress),
        (r"(?i)/(sites/default/|core/changelog\.txt)", Technology::Drupal),
        (r"(?i)/administrator/manifests/|/media/jui/", Technology::Joomla),
        (r"(?i)/(phpmyadmin|pma)(/|$)", Technology::PhpMyAdmin),
        (r"(?i)/(telescope|horizon|storage/logs/laravel\.log)", Technology::Laravel),
        (r"(?i)/__debug__/|/static/admin/", Technology::Django),
        (r"(?i)/rails/info/", Technology::Rails),
        (r"(?i)/actuator(/|$)", Technology::Spring),
        (r"(?i)\.(aspx|axd)$", Technology::AspNet),
        (r"(?i)/(manager|host-manager)/html", Technology::Tomcat),
        (r"(?i)/(asynchPeople|computer)/", Technology::Jenkins),
        (r"(?i)/users/sign_in|/api/v4/", Technology::GitLab),
    ]
    .into_iter()
    .map(|(pattern, tech)| (Regex::new(pattern).unwrap(), tech))
    .collect()
});

pub fn technology_severity(tech: Technology) -> Severity {
    match tech {
        Technology::PhpMyAdmin | Technology::Jenkins => Severity::Medium,
        Technology::WordPress | Technology::Drupal | Technology::Joomla => Severity::Low,
        _ => Severity::Info,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_is_severity_ordered() {
        let severities: Vec<Severity> = FINDING_CATALOG.iter().map(|r| r.severity).collect();
        let mut sorted = severities.clone();
        sorted.sort();
        assert_eq!(severities, sorted);
    }

    #[test]
    fn test_catalog_types_are_unique() {
        let mut types: Vec<&str> = FINDING_CATALOG.iter().map(|r| r.finding_type).collect();
        let total = types.len();
        types.sort();
        types.dedup();
        assert_eq!(types.len(), total);
    }

    #[test]
    fn test_tables_compile() {
        assert_eq!(CATEGORY_RULES.len(), 8);
        assert!(!TECHNOLOGY_PATH_RULES.is_empty());
    }
}
