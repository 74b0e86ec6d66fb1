//! Fixtures shared by the integration tests.
#![allow(dead_code)]

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::NaiveDate;
use dmarc_ingest::{Config, FixedClock, WaitPolicy};
use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::{Cursor, Write};
use std::time::Duration;
use zip::write::SimpleFileOptions;

pub const INBOX: &str = "dmarc-inbox";
pub const OUTPUT: &str = "dmarc-output";

/// Two records: the first with one DKIM result, the second with two.
pub const TWO_RECORD_REPORT: &str = r#"<?xml version="1.0" encoding="UTF-8" ?>
<feedback>
  <report_metadata>
    <org_name>Yahoo</org_name>
    <report_id>1714521600.123456</report_id>
  </report_metadata>
  <record>
    <row>
      <source_ip>192.0.2.10</source_ip>
      <count>4</count>
      <policy_evaluated><disposition>none</disposition><dkim>pass</dkim><spf>pass</spf></policy_evaluated>
    </row>
    <identifiers><header_from>example.com</header_from></identifiers>
    <auth_results>
      <dkim><domain>example.com</domain><result>pass</result><selector>s2048</selector></dkim>
      <spf><domain>example.com</domain><result>pass</result></spf>
    </auth_results>
  </record>
  <record>
    <row>
      <source_ip>203.0.113.5</source_ip>
      <count>1</count>
      <policy_evaluated><disposition>reject</disposition><dkim>fail</dkim><spf>fail</spf></policy_evaluated>
    </row>
    <identifiers><header_from>example.com</header_from></identifiers>
    <auth_results>
      <dkim><domain>example.com</domain><result>fail</result></dkim>
      <dkim><domain>esp.example.net</domain><result>pass</result><selector>k1</selector></dkim>
      <spf><domain>esp.example.net</domain><result>fail</result></spf>
    </auth_results>
  </record>
</feedback>
"#;

pub fn test_config() -> Config {
    Config {
        output_bucket: Some(OUTPUT.to_string()),
        wait: WaitPolicy {
            timeout: Duration::from_millis(200),
            initial_delay: Duration::from_millis(5),
            max_delay: Duration::from_millis(25),
        },
        ..Config::default()
    }
}

pub fn fixed_clock() -> FixedClock {
    FixedClock(
        NaiveDate::from_ymd_opt(2024, 5, 1)
            .and_then(|d| d.and_hms_opt(8, 30, 0))
            .unwrap(),
    )
}

pub fn gzip(data: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

pub fn zip_of(members: &[(&str, &str)]) -> Vec<u8> {
    let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for (name, data) in members {
        zip.start_file(*name, SimpleFileOptions::default()).unwrap();
        zip.write_all(data.as_bytes()).unwrap();
    }
    zip.finish().unwrap().into_inner()
}

/// A two-part report email whose second part carries `payload` base64-encoded.
pub fn report_email(content_type: &str, file_name: &str, payload: &[u8]) -> Vec<u8> {
    format!(
        "From: dmarc-reports@receiver.example\r\n\
         To: dmarc@example.com\r\n\
         Subject: Report Domain: example.com\r\n\
         MIME-Version: 1.0\r\n\
         Content-Type: multipart/mixed; boundary=\"=_report\"\r\n\
         \r\n\
         --=_report\r\n\
         Content-Type: text/plain; charset=us-ascii\r\n\
         \r\n\
         Aggregate report attached.\r\n\
         --=_report\r\n\
         Content-Type: {content_type}; name=\"{file_name}\"\r\n\
         Content-Disposition: attachment; filename=\"{file_name}\"\r\n\
         Content-Transfer-Encoding: base64\r\n\
         \r\n\
         {body}\r\n\
         --=_report--\r\n",
        body = STANDARD.encode(payload),
    )
    .into_bytes()
}
