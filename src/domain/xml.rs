use quick_xml::events::Event;
use quick_xml::Reader;

use crate::domain::errors::{WxpayError, WxpayResult};
use crate::domain::fields::FieldBag;

/// 参数集编码为接口报文
///
/// 单层`<xml>`结构，数值原样输出，其余值包CDATA，与网关约定一致。
pub fn encode(bag: &FieldBag) -> String {
    let mut xml = String::from("<xml>");
    for (key, value) in bag.iter() {
        if value.parse::<i64>().is_ok() {
            xml.push_str(&format!("<{key}>{value}</{key}>"));
        } else {
            xml.push_str(&format!("<{key}><![CDATA[{value}]]></{key}>"));
        }
    }
    xml.push_str("</xml>");
    xml
}

/// 接口报文解析为参数集
///
/// 报文必须是格式正确的单层XML，否则返回`MalformedResponse`。
/// 值一律按字符串返回，数值转换由调用方负责。
pub fn decode(xml: &str) -> WxpayResult<FieldBag> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut bag = FieldBag::new();
    let mut buf = Vec::new();
    let mut current_key = String::new();
    let mut depth = 0usize;
    let mut seen_root = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                depth += 1;
                match depth {
                    1 => seen_root = true,
                    2 => {
                        current_key = String::from_utf8_lossy(e.name().as_ref()).to_string();
                        bag.set(&current_key, "");
                    }
                    _ => {
                        return Err(WxpayError::MalformedResponse(format!(
                            "nested element not allowed: {}",
                            String::from_utf8_lossy(e.name().as_ref())
                        )));
                    }
                }
            }
            Ok(Event::Text(e)) => {
                if depth == 2 && !current_key.is_empty() {
                    let text = e
                        .unescape()
                        .map_err(|e| WxpayError::MalformedResponse(e.to_string()))?;
                    bag.set(&current_key, text.as_ref());
                }
            }
            Ok(Event::CData(e)) => {
                if depth == 2 && !current_key.is_empty() {
                    let text = String::from_utf8_lossy(e.as_ref()).to_string();
                    bag.set(&current_key, text);
                }
            }
            Ok(Event::Empty(ref e)) => {
                // 自闭合标签等价于空值字段
                if depth == 1 {
                    let key = String::from_utf8_lossy(e.name().as_ref()).to_string();
                    bag.set(&key, "");
                }
            }
            Ok(Event::End(_)) => {
                depth = depth.saturating_sub(1);
                if depth < 2 {
                    current_key.clear();
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(WxpayError::MalformedResponse(e.to_string())),
        }
        buf.clear();
    }

    if !seen_root || depth != 0 {
        return Err(WxpayError::MalformedResponse(
            "document is not single-level xml".to_string(),
        ));
    }
    Ok(bag)
}
