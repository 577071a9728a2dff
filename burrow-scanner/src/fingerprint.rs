//! Server / framework fingerprinting from response headers and body.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Technology {
    WordPress,
    Drupal,
    Joomla,
    PhpMyAdmin,
    Laravel,
    Django,
    Rails,
    Spring,
    AspNet,
    Php,
    Tomcat,
    Jenkins,
    GitLab,
    NodeExpress,
    Nginx,
    Apache,
    Iis,
}

impl Technology {
    pub fn as_str(&self) -> &'static str {
        match self {
            Technology::WordPress => "wordpress",
            Technology::Drupal => "drupal",
            Technology::Joomla => "joomla",
            Technology::PhpMyAdmin => "phpmyadmin",
            Technology::Laravel => "laravel",
            Technology::Django => "django",
            Technology::Rails => "rails",
            Technology::Spring => "spring",
            Technology::AspNet => "aspnet",
            Technology::Php => "php",
            Technology::Tomcat => "tomcat",
            Technology::Jenkins => "jenkins",
            Technology::GitLab => "gitlab",
            Technology::NodeExpress => "express",
            Technology::Nginx => "nginx",
            Technology::Apache => "apache",
            Technology::Iis => "iis",
        }
    }

    /// Maps a free-form label (as found in prior scan data) to a technology.
    pub fn from_label(label: &str) -> Option<Self> {
        let label = label.trim().to_lowercase();
        let tech = match label.as_str() {
            "wordpress" | "wp" => Technology::WordPress,
            "drupal" => Technology::Drupal,
            "joomla" => Technology::Joomla,
            "phpmyadmin" | "pma" => Technology::PhpMyAdmin,
            "laravel" => Technology::Laravel,
            "django" => Technology::Django,
            "rails" | "ruby on rails" => Technology::Rails,
            "spring" | "spring boot" | "springboot" => Technology::Spring,
            "asp.net" | "aspnet" | "asp" => Technology::AspNet,
            "php" => Technology::Php,
            "tomcat" | "apache tomcat" => Technology::Tomcat,
            "jenkins" => Technology::Jenkins,
            "gitlab" => Technology::GitLab,
            "express" | "node" | "nodejs" | "node.js" => Technology::NodeExpress,
            "nginx" => Technology::Nginx,
            "apache" | "httpd" => Technology::Apache,
            "iis" | "microsoft-iis" => Technology::Iis,
            _ => return None,
        };
        Some(tech)
    }

    /// Applications and frameworks worth reporting on their own, as opposed
    /// to plain web servers.
    pub fn is_application(&self) -> bool {
        !matches!(
            self,
            Technology::Nginx | Technology::Apache | Technology::Iis | Technology::Php
        )
    }
}

impl fmt::Display for Technology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Fingerprint {
    pub server: Option<String>,
    pub technologies: Vec<Technology>,
}

impl Fingerprint {
    pub fn add(&mut self, tech: Technology) {
        if !self.technologies.contains(&tech) {
            self.technologies.push(tech);
        }
    }
}

/// (header name, value substring, technology). Matching is case-insensitive.
const HEADER_RULES: &[(&str, &str, Technology)] = &[
    ("server", "nginx", Technology::Nginx),
    ("server", "apache-coyote", Technology::Tomcat),
    ("server", "tomcat", Technology::Tomcat),
    ("server", "apache", Technology::Apache),
    ("server", "microsoft-iis", Technology::Iis),
    ("x-powered-by", "php", Technology::Php),
    ("x-powered-by", "asp.net", Technology::AspNet),
    ("x-powered-by", "express", Technology::NodeExpress),
    ("x-aspnet-version", "", Technology::AspNet),
    ("x-generator", "drupal", Technology::Drupal),
    ("x-generator", "wordpress", Technology::WordPress),
    ("x-drupal-cache", "", Technology::Drupal),
    ("x-jenkins", "", Technology::Jenkins),
    ("x-gitlab-meta", "", Technology::GitLab),
    ("x-runtime", "", Technology::Rails),
    ("link", "wp-json", Technology::WordPress),
    ("set-cookie", "laravel_session", Technology::Laravel),
    ("set-cookie", "phpsessid", Technology::Php),
    ("set-cookie", "csrftoken", Technology::Django),
    ("set-cookie", "wordpress_", Technology::WordPress),
    ("set-cookie", "asp.net_sessionid", Technology::AspNet),
];

static CONTENT_RULES: Lazy<Vec<(Regex, Technology)>> = Lazy::new(|| {
    [
        (r"(?i)/wp-(content|includes)/", Technology::WordPress),
        (r#"(?i)<meta name="generator" content="wordpress"#, Technology::WordPress),
        (r"(?i)drupal\.settings|/sites/default/files/|drupal\.js", Technology::Drupal),
        (r"(?i)/media/jui/|joomla!", Technology::Joomla),
        (r"(?i)phpmyadmin", Technology::PhpMyAdmin),
        (r"(?i)laravel", Technology::Laravel),
        (r"csrfmiddlewaretoken", Technology::Django),
        (r#"(?i)name="csrf-param" content="authenticity_token""#, Technology::Rails),
        (r"Whitelabel Error Page", Technology::Spring),
        (r"__VIEWSTATE", Technology::AspNet),
        (r"(?i)apache tomcat", Technology::Tomcat),
        (r"(?i)\[jenkins\]", Technology::Jenkins),
        (r#"(?i)content="gitlab"|gon\.gitlab_url"#, Technology::GitLab),
    ]
    .into_iter()
    .map(|(pattern, tech)| (Regex::new(pattern).unwrap(), tech))
    .collect()
});

/// Fingerprints a response. Header names in `headers` must be lowercase.
pub fn fingerprint_response(headers: &HashMap<String, String>, body: &str) -> Fingerprint {
    let mut fingerprint = Fingerprint {
        server: headers.get("server").cloned(),
        technologies: Vec::new(),
    };

    for (name, needle, tech) in HEADER_RULES {
        if let Some(value) = headers.get(*name)
            && value.to_lowercase().contains(*needle)
        {
            fingerprint.add(*tech);
        }
    }

    for (pattern, tech) in CONTENT_RULES.iter() {
        if pattern.is_match(body) {
            fingerprint.add(*tech);
        }
    }

    // "apache" also matches "Apache-Coyote"
    if fingerprint.technologies.contains(&Technology::Tomcat) {
        fingerprint.technologies.retain(|t| *t != Technology::Apache);
    }

    fingerprint
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_wordpress_from_body() {
        let fp = fingerprint_response(
            &headers(&[("server", "nginx/1.24.0")]),
            r#"<link rel="stylesheet" href="/wp-content/themes/x/style.css">"#,
        );
        assert_eq!(fp.server.as_deref(), Some("nginx/1.24.0"));
        assert!(fp.technologies.contains(&Technology::WordPress));
        assert!(fp.technologies.contains(&Technology::Nginx));
    }

    #[test]
    fn test_tomcat_does_not_report_apache() {
        let fp = fingerprint_response(&headers(&[("server", "Apache-Coyote/1.1")]), "");
        assert_eq!(fp.technologies, vec![Technology::Tomcat]);
    }

    #[test]
    fn test_cookie_rules() {
        let fp = fingerprint_response(
            &headers(&[("set-cookie", "laravel_session=abc; path=/")]),
            "",
        );
        assert_eq!(fp.technologies, vec![Technology::Laravel]);
    }

    #[test]
    fn test_empty_response_has_no_technologies() {
        let fp = fingerprint_response(&HashMap::new(), "");
        assert_eq!(fp, Fingerprint::default());
    }

    #[test]
    fn test_from_label() {
        assert_eq!(Technology::from_label(" WordPress "), Some(Technology::WordPress));
        assert_eq!(Technology::from_label("Microsoft-IIS"), Some(Technology::Iis));
        assert_eq!(Technology::from_label("cobol"), None);
        assert!(Technology::WordPress.is_application());
        assert!(!Technology::Nginx.is_application());
    }
}
