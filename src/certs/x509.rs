//! Minimal DER reader for the X.509 fields a trusted certificate entity needs:
//! serial number, issuer and subject. Names are rendered in RFC 2253 form
//! (most specific RDN first), serials in decimal.

use std::fmt::Write as _;

const TAG_INTEGER: u8 = 0x02;
const TAG_OID: u8 = 0x06;
const TAG_UTF8_STRING: u8 = 0x0C;
const TAG_PRINTABLE_STRING: u8 = 0x13;
const TAG_TELETEX_STRING: u8 = 0x14;
const TAG_IA5_STRING: u8 = 0x16;
const TAG_UNIVERSAL_STRING: u8 = 0x1C;
const TAG_BMP_STRING: u8 = 0x1E;
const TAG_SEQUENCE: u8 = 0x30;
const TAG_SET: u8 = 0x31;
const TAG_EXPLICIT_VERSION: u8 = 0xA0;

/// Fields read from a certificate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateInfo {
    pub serial_number: String,
    pub issuer_name: String,
    pub subject_name: String,
}

/// Read serial, issuer and subject from a DER encoded certificate
pub fn parse_certificate(der: &[u8]) -> Result<CertificateInfo, String> {
    let certificate = Reader::new(der).take(TAG_SEQUENCE, "certificate")?;
    let mut tbs = Reader::new(Reader::new(certificate).take(TAG_SEQUENCE, "tbsCertificate")?);

    if tbs.peek_tag() == Some(TAG_EXPLICIT_VERSION) {
        tbs.read()?;
    }
    let serial = tbs.take(TAG_INTEGER, "serialNumber")?;
    tbs.take(TAG_SEQUENCE, "signature")?;
    let issuer = tbs.take(TAG_SEQUENCE, "issuer")?;
    tbs.take(TAG_SEQUENCE, "validity")?;
    let subject = tbs.take(TAG_SEQUENCE, "subject")?;

    Ok(CertificateInfo {
        serial_number: decimal(serial),
        issuer_name: rfc2253(issuer)?,
        subject_name: rfc2253(subject)?,
    })
}

struct Tlv<'a> {
    tag: u8,
    content: &'a [u8],
    raw: &'a [u8],
}

struct Reader<'a> {
    data: &'a [u8],
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    fn peek_tag(&self) -> Option<u8> {
        self.data.first().copied()
    }

    fn read(&mut self) -> Result<Tlv<'a>, String> {
        let data = self.data;
        let (&tag, rest) = data.split_first().ok_or("unexpected end of DER data")?;
        let (&first, rest) = rest.split_first().ok_or("truncated DER length")?;

        let (length, rest) = if first & 0x80 == 0 {
            (usize::from(first), rest)
        } else {
            let count = usize::from(first & 0x7F);
            if count == 0 || count > 4 || rest.len() < count {
                return Err(format!("unsupported DER length encoding 0x{:02x}", first));
            }
            let length = rest[..count]
                .iter()
                .fold(0usize, |acc, byte| (acc << 8) | usize::from(*byte));
            (length, &rest[count..])
        };

        if rest.len() < length {
            return Err(format!(
                "DER element 0x{:02x} claims {} bytes, only {} available",
                tag,
                length,
                rest.len()
            ));
        }
        let header = data.len() - rest.len();
        self.data = &rest[length..];
        Ok(Tlv {
            tag,
            content: &rest[..length],
            raw: &data[..header + length],
        })
    }

    fn take(&mut self, tag: u8, what: &str) -> Result<&'a [u8], String> {
        let tlv = self.read()?;
        if tlv.tag != tag {
            return Err(format!("expected {} (tag 0x{:02x}), found tag 0x{:02x}", what, tag, tlv.tag));
        }
        Ok(tlv.content)
    }
}

/// Unsigned big-endian integer as a decimal string
pub fn decimal(bytes: &[u8]) -> String {
    let mut digits: Vec<u8> = bytes.iter().skip_while(|b| **b == 0).copied().collect();
    if digits.is_empty() {
        return "0".to_string();
    }

    let mut out = Vec::new();
    while !digits.is_empty() {
        let mut remainder = 0u32;
        for byte in digits.iter_mut() {
            let value = (remainder << 8) | u32::from(*byte);
            *byte = (value / 10) as u8;
            remainder = value % 10;
        }
        out.push(b'0' + remainder as u8);
        let leading = digits.iter().take_while(|b| **b == 0).count();
        digits.drain(..leading);
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}

fn rfc2253(name: &[u8]) -> Result<String, String> {
    let mut rdns = Vec::new();
    let mut reader = Reader::new(name);
    while !reader.is_empty() {
        let mut set = Reader::new(reader.take(TAG_SET, "relative distinguished name")?);
        let mut attributes = Vec::new();
        while !set.is_empty() {
            let mut attribute = Reader::new(set.take(TAG_SEQUENCE, "attribute")?);
            let oid = attribute.take(TAG_OID, "attribute type")?;
            let value = attribute.read()?;
            attributes.push(attribute_string(oid, &value)?);
        }
        rdns.push(attributes.join("+"));
    }
    rdns.reverse();
    Ok(rdns.join(","))
}

fn attribute_string(oid: &[u8], value: &Tlv<'_>) -> Result<String, String> {
    let dotted = oid_string(oid)?;
    match (keyword(&dotted), string_value(value)) {
        (Some(keyword), Some(text)) => Ok(format!("{}={}", keyword, escape(&text))),
        _ => {
            // Unknown attribute types are written as their dotted OID and DER hex
            let mut hex = String::with_capacity(value.raw.len() * 2);
            for byte in value.raw {
                let _ = write!(hex, "{:02x}", byte);
            }
            Ok(format!("{}=#{}", dotted, hex))
        }
    }
}

fn keyword(oid: &str) -> Option<&'static str> {
    match oid {
        "2.5.4.3" => Some("CN"),
        "2.5.4.6" => Some("C"),
        "2.5.4.7" => Some("L"),
        "2.5.4.8" => Some("ST"),
        "2.5.4.9" => Some("STREET"),
        "2.5.4.10" => Some("O"),
        "2.5.4.11" => Some("OU"),
        "0.9.2342.19200300.100.1.25" => Some("DC"),
        "0.9.2342.19200300.100.1.1" => Some("UID"),
        _ => None,
    }
}

fn string_value(value: &Tlv<'_>) -> Option<String> {
    match value.tag {
        TAG_UTF8_STRING | TAG_PRINTABLE_STRING | TAG_IA5_STRING | TAG_TELETEX_STRING => {
            String::from_utf8(value.content.to_vec()).ok()
        }
        TAG_BMP_STRING => {
            let units: Vec<u16> = value
                .content
                .chunks_exact(2)
                .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
                .collect();
            String::from_utf16(&units).ok()
        }
        TAG_UNIVERSAL_STRING => value
            .content
            .chunks_exact(4)
            .map(|quad| char::from_u32(u32::from_be_bytes([quad[0], quad[1], quad[2], quad[3]])))
            .collect(),
        _ => None,
    }
}

fn oid_string(oid: &[u8]) -> Result<String, String> {
    let (&first, rest) = oid.split_first().ok_or("empty object identifier")?;
    let mut out = format!("{}.{}", first / 40, first % 40);
    let mut component: u64 = 0;
    for byte in rest {
        component = (component << 7) | u64::from(byte & 0x7F);
        if byte & 0x80 == 0 {
            let _ = write!(out, ".{}", component);
            component = 0;
        }
    }
    Ok(out)
}

fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let last = value.chars().count().saturating_sub(1);
    for (index, c) in value.chars().enumerate() {
        let special = matches!(c, ',' | '+' | '"' | '\\' | '<' | '>' | ';')
            || (index == 0 && (c == '#' || c == ' '))
            || (index == last && c == ' ');
        if special {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;

    /// Self-signed EC certificate, serial 0x1234, subject C=US, O="Example, Inc.", CN=test.example.com
    const TEST_CERT_DER_B64: &str = "MIIBxDCCAWugAwIBAgICEjQwCgYIKoZIzj0EAwIwQDELMAkGA1UEBhMCVVMxFjAUBgNVBAoMDUV4YW1wbGUsIEluYy4xGTAXBgNVBAMMEHRlc3QuZXhhbXBsZS5jb20wIBcNMjYxMDE2MDAxMDA1WhgPMjEyNjA5MjIwMDEwMDVaMEAxCzAJBgNVBAYTAlVTMRYwFAYDVQQKDA1FeGFtcGxlLCBJbmMuMRkwFwYDVQQDDBB0ZXN0LmV4YW1wbGUuY29tMFkwEwYHKoZIzj0CAQYIKoZIzj0DAQcDQgAECSQS3widgLKeNovwQ8MbJJ+MuVBoQ03Uz06QAZJvOR1EcBFI7Ct7hu6jOChGRvxWPUzUmG3hdgCBybw9euGPSKNTMFEwHQYDVR0OBBYEFE8wGLE0/AQPX2xXT/xRRS2WIX6bMB8GA1UdIwQYMBaAFE8wGLE0/AQPX2xXT/xRRS2WIX6bMA8GA1UdEwEB/wQFMAMBAf8wCgYIKoZIzj0EAwIDRwAwRAIgGuApNXi0KuvbrqHeN7Ed8c6/m+pAh/A2AQU4f9T8cQ8CIDS+Zawf4/K5Sq0vMT8H+V90/c19iUsKiDg9qLEB8HVF";

    #[test]
    fn test_reads_names_and_serial() {
        let der = STANDARD.decode(TEST_CERT_DER_B64).unwrap();
        let info = parse_certificate(&der).unwrap();
        assert_eq!(info.serial_number, "4660");
        assert_eq!(info.subject_name, "CN=test.example.com,O=Example\\, Inc.,C=US");
        assert_eq!(info.issuer_name, info.subject_name);
    }

    #[test]
    fn test_decimal_serials() {
        assert_eq!(decimal(&[0x00]), "0");
        assert_eq!(decimal(&[0x00, 0xFF]), "255");
        assert_eq!(
            decimal(&[0x01, 0x23, 0x45, 0x67, 0x89, 0xAB, 0xCD, 0xEF, 0x01, 0x23]),
            "5373003642731685151011"
        );
    }

    #[test]
    fn test_rejects_truncated_data() {
        let der = STANDARD.decode(TEST_CERT_DER_B64).unwrap();
        assert!(parse_certificate(&der[..40]).is_err());
        assert!(parse_certificate(&[]).is_err());
    }

    #[test]
    fn test_escaping() {
        assert_eq!(escape(" lead"), "\\ lead");
        assert_eq!(escape("a+b"), "a\\+b");
        assert_eq!(escape("#x"), "\\#x");
    }
}
