use hmac::{Hmac, Mac};
use rand::Rng;
use sha2::Sha256;

use crate::domain::errors::{WxpayError, WxpayResult};
use crate::domain::fields::FieldBag;
use crate::domain::value_objects::SignType;

type HmacSha256 = Hmac<Sha256>;

/// 签名字段名，参与签名的串中必须剔除
pub const SIGN_FIELD: &str = "sign";

/// 随机字符串默认长度
pub const NONCE_LENGTH: usize = 32;

/// 计算签名
///
/// 规则：剔除`sign`字段，其余字段按键的字典序升序拼接为`k=v&`，
/// 值为空的字段跳过（跳过与否会改变摘要，属于协议规则），
/// 末尾拼接`key=商户密钥`，对整串做摘要后输出大写十六进制。
pub fn sign(bag: &FieldBag, key: &str, sign_type: SignType) -> String {
    let mut buf = String::new();
    for (k, v) in bag.iter() {
        if k == SIGN_FIELD || v.is_empty() {
            continue;
        }
        buf.push_str(k);
        buf.push('=');
        buf.push_str(v);
        buf.push('&');
    }
    buf.push_str("key=");
    buf.push_str(key);

    match sign_type {
        SignType::Md5 => hex::encode_upper(md5::compute(buf.as_bytes()).0),
        SignType::HmacSha256 => {
            let mut mac = HmacSha256::new_from_slice(key.as_bytes())
                .expect("HMAC can take key of any size");
            mac.update(buf.as_bytes());
            hex::encode_upper(mac.finalize().into_bytes())
        }
    }
}

/// 验证签名
///
/// 无`sign`字段或摘要不符时返回`InvalidSignature`。
pub fn verify(bag: &FieldBag, key: &str, sign_type: SignType) -> WxpayResult<()> {
    let given = bag.get(SIGN_FIELD).ok_or(WxpayError::InvalidSignature)?;
    let expected = sign(bag, key, sign_type);
    if constant_time_eq(given.as_bytes(), expected.as_bytes()) {
        Ok(())
    } else {
        Err(WxpayError::InvalidSignature)
    }
}

// 避免按字节短路比较泄露摘要前缀
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// 产生随机字符串，小写字母加数字，每次调用独立采样
pub fn nonce_str(length: usize) -> String {
    const CHARS: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
    let mut rng = rand::thread_rng();
    (0..length)
        .map(|_| CHARS[rng.gen_range(0..CHARS.len())] as char)
        .collect()
}
