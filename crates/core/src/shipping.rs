//! Shipping address capture and validation.
//!
//! [`ShippingForm`] is the raw submission; [`ShippingForm::validate`] produces
//! per-field messages keyed by the form's camelCase field names, and
//! [`ShippingForm::into_validated`] yields a [`ShippingInfo`] only when every
//! rule passes.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::types::Email;

/// The 47 prefectures, in the usual north-to-south order.
pub const PREFECTURES: [&str; 47] = [
    "北海道", "青森県", "岩手県", "宮城県", "秋田県", "山形県", "福島県",
    "茨城県", "栃木県", "群馬県", "埼玉県", "千葉県", "東京都", "神奈川県",
    "新潟県", "富山県", "石川県", "福井県", "山梨県", "長野県", "岐阜県",
    "静岡県", "愛知県", "三重県", "滋賀県", "京都府", "大阪府", "兵庫県",
    "奈良県", "和歌山県", "鳥取県", "島根県", "岡山県", "広島県", "山口県",
    "徳島県", "香川県", "愛媛県", "高知県", "福岡県", "佐賀県", "長崎県",
    "熊本県", "大分県", "宮崎県", "鹿児島県", "沖縄県",
];

static POSTAL_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]{3}-?[0-9]{4}$").expect("valid postal code regex"));

static PHONE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^0[0-9]{1,4}-?[0-9]{1,4}-?[0-9]{4}$").expect("valid phone regex")
});

const MSG_FULL_NAME: &str = "氏名を入力してください";
const MSG_POSTAL_CODE: &str = "正しい郵便番号を入力してください（例: 123-4567）";
const MSG_PREFECTURE: &str = "都道府県を選択してください";
const MSG_CITY: &str = "市区町村を入力してください";
const MSG_ADDRESS: &str = "番地を入力してください";
const MSG_PHONE: &str = "正しい電話番号を入力してください";
const MSG_EMAIL: &str = "正しいメールアドレスを入力してください";

/// Whether `value` is a valid Japanese postal code (`123-4567` or `1234567`).
#[must_use]
pub fn is_valid_postal_code(value: &str) -> bool {
    POSTAL_CODE.is_match(value)
}

/// Whether `value` looks like a domestic phone number.
#[must_use]
pub fn is_valid_phone(value: &str) -> bool {
    PHONE.is_match(value)
}

/// Whether `value` names one of the 47 prefectures.
#[must_use]
pub fn is_prefecture(value: &str) -> bool {
    PREFECTURES.contains(&value)
}

/// Raw shipping form values as submitted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ShippingForm {
    pub full_name: String,
    pub postal_code: String,
    pub prefecture: String,
    pub city: String,
    pub address: String,
    pub building: Option<String>,
    pub phone: String,
    pub email: String,
}

/// Outcome of validating a [`ShippingForm`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingValidation {
    pub valid: bool,
    pub field_errors: BTreeMap<&'static str, &'static str>,
}

/// A validated shipping address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingInfo {
    pub full_name: String,
    pub postal_code: String,
    pub prefecture: String,
    pub city: String,
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub building: Option<String>,
    pub phone: String,
    pub email: Email,
}

impl ShippingForm {
    /// Check every field and collect messages for the ones that fail.
    #[must_use]
    pub fn validate(&self) -> ShippingValidation {
        let mut field_errors = BTreeMap::new();

        if self.full_name.trim().is_empty() {
            field_errors.insert("fullName", MSG_FULL_NAME);
        }
        if !is_valid_postal_code(&self.postal_code) {
            field_errors.insert("postalCode", MSG_POSTAL_CODE);
        }
        if !is_prefecture(&self.prefecture) {
            field_errors.insert("prefecture", MSG_PREFECTURE);
        }
        if self.city.trim().is_empty() {
            field_errors.insert("city", MSG_CITY);
        }
        if self.address.trim().is_empty() {
            field_errors.insert("address", MSG_ADDRESS);
        }
        if !is_valid_phone(&self.phone) {
            field_errors.insert("phone", MSG_PHONE);
        }
        if Email::parse(&self.email).is_err() {
            field_errors.insert("email", MSG_EMAIL);
        }

        ShippingValidation {
            valid: field_errors.is_empty(),
            field_errors,
        }
    }

    /// Validate and convert into a [`ShippingInfo`].
    ///
    /// An empty or whitespace-only building is stored as `None`.
    ///
    /// # Errors
    ///
    /// Returns the failed validation when any field is invalid.
    pub fn into_validated(self) -> Result<ShippingInfo, ShippingValidation> {
        let validation = self.validate();
        if !validation.valid {
            return Err(validation);
        }
        let email = Email::parse(&self.email).map_err(|_| validation.clone())?;

        Ok(ShippingInfo {
            full_name: self.full_name,
            postal_code: self.postal_code,
            prefecture: self.prefecture,
            city: self.city,
            address: self.address,
            building: self.building.filter(|b| !b.trim().is_empty()),
            phone: self.phone,
            email,
        })
    }
}
