//! Round-trip: every line the generator can emit parses back to its fields.

use chrono::{SecondsFormat, TimeZone, Utc};

use logsim_parser::codec::parse_line;

const IPS: &[&str] = &["192.168.1.1", "192.168.1.2", "10.0.0.1"];
const METHODS: &[&str] = &["GET", "POST", "PUT", "DELETE"];
const PATHS: &[&str] = &["/home", "/login", "/profile", "/dashboard"];
const STATUSES: &[i32] = &[200, 404, 500, 301];
const REFERRERS: &[&str] = &[
    "-",
    "https://www.google.com",
    "https://www.bing.com",
    "https://www.example.com",
];
const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/58.0.3029.110 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Edge/18.18362",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_4) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/80.0.3987.132 Safari/537.36",
];

#[test]
fn every_sample_combination_round_trips() {
    let timestamp = Utc.with_ymd_and_hms(2025, 4, 10, 10, 20, 30).unwrap();
    let stamp = timestamp.to_rfc3339_opts(SecondsFormat::Secs, true);
    let forwarded = "212.32.188.247";
    let body_bytes = 1043;

    for ip in IPS {
        for method in METHODS {
            for path in PATHS {
                for status in STATUSES {
                    for referrer in REFERRERS {
                        for agent in USER_AGENTS {
                            let line = format!(
                                "{} - - [{}] \"{} {} HTTP/1.1\" {} {} \"{}\" \"{}\" \"{}\"",
                                ip, stamp, method, path, status, body_bytes, referrer, agent,
                                forwarded
                            );
                            let log = parse_line(&line)
                                .unwrap_or_else(|| panic!("line must parse: {}", line));
                            assert_eq!(log.remote_addr, *ip);
                            assert_eq!(log.remote_user, "-");
                            assert_eq!(log.time_local, timestamp);
                            assert_eq!(log.request, format!("{} {} HTTP/1.1", method, path));
                            assert_eq!(log.status, *status);
                            assert_eq!(log.body_bytes_sent, body_bytes);
                            assert_eq!(log.http_referer, *referrer);
                            assert_eq!(log.http_user_agent, *agent);
                            assert_eq!(log.http_x_forwarded_for, forwarded);
                        }
                    }
                }
            }
        }
    }
}
