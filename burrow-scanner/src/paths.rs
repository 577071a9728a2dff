// Built-in path catalogs used by the prober phases

use crate::fingerprint::{Fingerprint, Technology};

/// Well-known sensitive paths probed against every active base URL.
pub const COMMON_PATHS: &[&str] = &[
    "/robots.txt",
    "/sitemap.xml",
    "/security.txt",
    "/.well-known/security.txt",
    "/crossdomain.xml",
    "/humans.txt",
    "/.git/",
    "/.git/config",
    "/.git/HEAD",
    "/.svn/",
    "/.hg/",
    "/.env",
    "/.env.local",
    "/.env.production",
    "/.htaccess",
    "/.htpasswd",
    "/.DS_Store",
    "/.aws/credentials",
    "/web.config",
    "/config.php",
    "/config.json",
    "/config.yml",
    "/settings.py",
    "/admin/",
    "/administrator/",
    "/admin.php",
    "/login",
    "/login.php",
    "/signin",
    "/dashboard/",
    "/console/",
    "/manager/html",
    "/phpmyadmin/",
    "/pma/",
    "/adminer.php",
    "/wp-admin/",
    "/wp-login.php",
    "/user/login",
    "/api/",
    "/api/v1/",
    "/api/v2/",
    "/graphql",
    "/swagger.json",
    "/swagger-ui.html",
    "/openapi.json",
    "/api-docs",
    "/docs/",
    "/backup/",
    "/backups/",
    "/backup.zip",
    "/backup.sql",
    "/dump.sql",
    "/db.sql",
    "/old/",
    "/tmp/",
    "/logs/",
    "/uploads/",
    "/test/",
    "/dev/",
    "/staging/",
    "/debug/",
    "/phpinfo.php",
    "/info.php",
    "/server-status",
    "/server-info",
    "/status",
    "/health",
    "/metrics",
    "/actuator",
    "/actuator/env",
];

/// Index and config filenames probed inside discovered directories.
pub const DIRECTORY_FILES: &[&str] = &[
    "index.php",
    "index.html",
    "index.jsp",
    "default.aspx",
    "config.php",
    "config.json",
    ".htaccess",
    "web.config",
    ".env",
    "README.md",
];

/// Paths probed when nothing specific was fingerprinted.
const GENERIC_SMART_PATHS: &[&str] = &[
    "/api/health",
    "/api/swagger.json",
    "/v1/",
    "/v2/",
    "/.well-known/openid-configuration",
    "/version",
    "/info",
];

fn technology_paths(tech: Technology) -> &'static [&'static str] {
    match tech {
        Technology::WordPress => &[
            "/wp-admin/",
            "/wp-login.php",
            "/wp-json/wp/v2/users",
            "/wp-content/uploads/",
            "/wp-content/debug.log",
            "/wp-config.php.bak",
            "/xmlrpc.php",
            "/readme.html",
        ],
        Technology::Drupal => &[
            "/user/login",
            "/admin/config",
            "/CHANGELOG.txt",
            "/core/CHANGELOG.txt",
            "/sites/default/settings.php",
            "/sites/default/files/",
        ],
        Technology::Joomla => &[
            "/administrator/",
            "/configuration.php-dist",
            "/administrator/manifests/files/joomla.xml",
            "/language/en-GB/en-GB.xml",
        ],
        Technology::PhpMyAdmin => &["/phpmyadmin/setup/", "/phpmyadmin/index.php", "/pma/index.php"],
        Technology::Laravel => &["/.env", "/storage/logs/laravel.log", "/telescope", "/horizon"],
        Technology::Django => &["/admin/", "/admin/login/", "/static/admin/", "/__debug__/"],
        Technology::Rails => &["/rails/info/routes", "/rails/info/properties", "/sidekiq"],
        Technology::Spring => &[
            "/actuator/health",
            "/actuator/env",
            "/actuator/mappings",
            "/actuator/heapdump",
            "/env",
            "/trace",
        ],
        Technology::AspNet => &["/elmah.axd", "/trace.axd", "/web.config.bak", "/bin/"],
        Technology::Php => &["/phpinfo.php", "/info.php", "/test.php", "/composer.json", "/vendor/"],
        Technology::Tomcat => &["/manager/html", "/host-manager/html", "/manager/status", "/examples/"],
        Technology::Jenkins => &["/script", "/asynchPeople/", "/computer/", "/credentials/"],
        Technology::GitLab => &["/explore", "/api/v4/projects", "/users/sign_in", "/help"],
        Technology::NodeExpress => &["/package.json", "/node_modules/", "/.npmrc", "/api/"],
        Technology::Nginx => &["/nginx_status", "/nginx.conf"],
        Technology::Apache => &["/server-status", "/server-info", "/.htaccess", "/icons/"],
        Technology::Iis => &["/iisstart.htm", "/aspnet_client/", "/_vti_bin/"],
    }
}

/// Builds the targeted path list for a fingerprinted base URL.
pub fn smart_paths(fingerprint: &Fingerprint) -> Vec<&'static str> {
    let mut paths: Vec<&'static str> = Vec::new();

    for tech in &fingerprint.technologies {
        for path in technology_paths(*tech) {
            if !paths.contains(path) {
                paths.push(path);
            }
        }
    }

    if paths.is_empty() {
        paths.extend_from_slice(GENERIC_SMART_PATHS);
    }

    paths
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_common_catalog_size_and_shape() {
        assert!(COMMON_PATHS.len() >= 60);
        assert!(COMMON_PATHS.iter().all(|p| p.starts_with('/')));
        assert!(!COMMON_PATHS.contains(&"/"));
        assert!(COMMON_PATHS.contains(&"/robots.txt"));
    }

    #[test]
    fn test_smart_paths_wordpress_only_when_detected() {
        let wp = Fingerprint {
            server: None,
            technologies: vec![Technology::WordPress],
        };
        assert!(smart_paths(&wp).contains(&"/wp-admin/"));

        let bare = Fingerprint::default();
        let paths = smart_paths(&bare);
        assert!(!paths.contains(&"/wp-admin/"));
        assert_eq!(paths, GENERIC_SMART_PATHS.to_vec());
    }

    #[test]
    fn test_smart_paths_are_unique() {
        let fp = Fingerprint {
            server: Some("nginx".to_string()),
            technologies: vec![Technology::Laravel, Technology::Php, Technology::Nginx],
        };
        let paths = smart_paths(&fp);
        let mut deduped = paths.clone();
        deduped.sort();
        deduped.dedup();
        assert_eq!(paths.len(), deduped.len());
    }
}
