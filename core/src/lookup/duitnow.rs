//! DuitNow (EMVCo merchant-presented) QR payload parsing.
//!
//! Only three facts are extracted: merchant name (tag 59), the account
//! identifier (sub-tag 02 of merchant account templates 26..=51) and the
//! acquiring bank (sub-tag 01, mapped through `BANK_CODES`).

use serde::Serialize;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DuitNowPayload {
    pub merchant_name: Option<String>,
    pub identifier:    Option<String>,
    pub bank_name:     Option<String>,
}

impl DuitNowPayload {
    pub fn is_empty(&self) -> bool {
        self.merchant_name.is_none() && self.identifier.is_none() && self.bank_name.is_none()
    }
}

const BANK_CODES: &[(&str, &str)] = &[
    ("629295", "AEON Bank (M) Berhad"),
    ("501664", "Affin Bank Berhad"),
    ("432134", "Al Rajhi Banking & Investment Corporation (Malaysia) Berhad"),
    ("504374", "Alliance Bank Malaysia Berhad"),
    ("564169", "AmBank Malaysia Berhad"),
    ("890293", "Ampersand Pay Sdn Bhd"),
    ("890061", "Axiata Digital eCode Sdn Bhd"),
    ("603346", "Bank Islam Malaysia Berhad"),
    ("589267", "Bank Kerjasama Rakyat Malaysia Berhad"),
    ("564167", "Bank Muamalat Malaysia Berhad"),
    ("629188", "Bank of America (M) Berhad"),
    ("629152", "Bank of China (M) Berhad"),
    ("589373", "Bank Pertanian Malaysia Berhad (Agrobank)"),
    ("420709", "Bank Simpanan Nasional"),
    ("890236", "Beez Fintech Sdn Bhd"),
    ("890012", "BigPay Malaysia Sdn Bhd"),
    ("629204", "BNP Paribas Malaysia Berhad"),
    ("629303", "Boost Bank Berhad"),
    ("890244", "Boost Connect Sdn Bhd"),
    ("629261", "China Construction Bank (Malaysia) Berhad"),
    ("501854", "CIMB Bank Berhad"),
    ("589170", "Citibank Berhad"),
    ("890160", "Curlec Sdn Bhd"),
    ("629246", "Deutsche Bank (M) Berhad"),
    ("890145", "Fass Payment Solutions Sdn Bhd"),
    ("890020", "Fave Asia Technologies Sdn Bhd"),
    ("890038", "Finexus Cards Sdn Bhd"),
    ("890103", "GHL Cardpay Sdn Bhd"),
    ("890186", "Global Payments Asia-Pacific Limited"),
    ("890046", "GPay Network (M) Sdn Bhd (GrabPay)"),
    ("629279", "GX Bank Berhad"),
    ("588830", "Hong Leong Bank Berhad"),
    ("589836", "HSBC Bank Berhad"),
    ("629253", "Industrial and Commercial Bank of China (M) Berhad"),
    ("890178", "Instapay Technologies Sdn Bhd"),
    ("890079", "iPay88 (M) Sdn Bhd"),
    ("629212", "JP Morgan Chase Bank Berhad"),
    ("629311", "KAF Investment Bank Berhad"),
    ("890152", "Kiplepay Sdn Bhd"),
    ("890228", "Koperasi Co-opbank Pertama Malaysia Berhad"),
    ("639406", "Kuwait Finance House (Malaysia) Berhad"),
    ("588734", "Malayan Banking Berhad (Maybank)"),
    ("890301", "ManagePay Systems Sdn Bhd"),
    ("432310", "MBSB Bank Berhad"),
    ("890111", "Merchantrade Asia Sdn Bhd"),
    ("629220", "Mizuho Bank (Malaysia) Berhad"),
    ("890210", "MobilityOne Sdn Bhd"),
    ("890277", "Mobiedge E-commerce Sdn Bhd"),
    ("890327", "MRuncit Commerce Sdn Bhd"),
    ("629196", "MUFG Bank (Malaysia) Berhad"),
    ("504324", "OCBC Bank Berhad"),
    ("890269", "Paydibs Sdn Bhd"),
    ("890194", "Payex PLT"),
    ("564162", "Public Bank Berhad"),
    ("890087", "Razer Merchant Services Sdn Bhd"),
    ("890095", "Revenue Solution Sdn Bhd"),
    ("564160", "RHB Bank Berhad"),
    ("890129", "Setel Ventures Sdn Bhd"),
    ("890004", "ShopeePay Malaysia Sdn Bhd"),
    ("890202", "SiliconNet Technologies Sdn Bhd"),
    ("539981", "Standard Chartered Bank Malaysia Berhad"),
    ("890137", "Stripe Payments Singapore Pte Ltd"),
    ("629238", "Sumitomo Mitsui Banking Corporation (M) Berhad"),
    ("890053", "TNG Digital Sdn Bhd"),
    ("890251", "UniPin (M) Sdn Bhd"),
    ("519469", "United Overseas Bank (Malaysia) Berhad"),
    ("890319", "Wannapay Sdn Bhd"),
    ("629287", "YTL Digital Bank Berhad"),
    ("890285", "2C2P System Sdn Bhd"),
    ("898989", "JomPAY"),
];

pub fn bank_name_for_code(code: &str) -> String {
    BANK_CODES
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, name)| name.to_string())
        .unwrap_or_else(|| format!("Unknown Bank Code {code}"))
}

/// Walk `TAG(2) LEN(2) VALUE(LEN)` records. Stops at the first malformed
/// record and yields what was read so far.
fn tlv_records(payload: &str) -> Vec<(&str, &str)> {
    let mut out = Vec::new();
    let mut i = 0;
    while i + 4 <= payload.len() {
        let (Some(tag), Some(len_raw)) = (payload.get(i..i + 2), payload.get(i + 2..i + 4)) else {
            break;
        };
        let Ok(len) = len_raw.parse::<usize>() else { break };
        let Some(value) = payload.get(i + 4..i + 4 + len) else { break };
        out.push((tag, value));
        i += 4 + len;
    }
    out
}

pub fn parse_duitnow(payload: &str) -> DuitNowPayload {
    let mut result = DuitNowPayload::default();
    for (tag, value) in tlv_records(payload.trim()) {
        if tag == "59" {
            result.merchant_name = Some(value.trim().to_string());
        }
        let is_account_template = tag.parse::<u8>().map(|t| (26..=51).contains(&t)).unwrap_or(false);
        if !is_account_template {
            continue;
        }
        for (sub_tag, sub_value) in tlv_records(value) {
            if sub_tag == "02" && result.identifier.is_none() {
                result.identifier = Some(sub_value.trim().to_string());
            }
            if sub_tag == "01" && result.bank_name.is_none() {
                result.bank_name = Some(bank_name_for_code(sub_value));
            }
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tlv(tag: &str, value: &str) -> String {
        format!("{tag}{:02}{value}", value.len())
    }

    #[test]
    fn extracts_merchant_identifier_and_bank() {
        let account = format!(
            "{}{}{}",
            tlv("00", "MY.COM.PAYNET"),
            tlv("01", "588734"),
            tlv("02", "1122334455")
        );
        let payload = format!(
            "{}{}{}{}",
            tlv("00", "01"),
            tlv("26", &account),
            tlv("59", "ALI TRADING "),
            tlv("63", "ABCD")
        );
        let parsed = parse_duitnow(&payload);
        assert_eq!(parsed.merchant_name.as_deref(), Some("ALI TRADING"));
        assert_eq!(parsed.identifier.as_deref(), Some("1122334455"));
        assert_eq!(parsed.bank_name.as_deref(), Some("Malayan Banking Berhad (Maybank)"));
    }

    #[test]
    fn unknown_bank_code_is_labelled() {
        assert_eq!(bank_name_for_code("000000"), "Unknown Bank Code 000000");
    }

    #[test]
    fn garbage_yields_empty_result() {
        assert!(parse_duitnow("hello world").is_empty());
        assert!(parse_duitnow("").is_empty());
    }
}
