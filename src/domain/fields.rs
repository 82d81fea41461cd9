use std::collections::btree_map;
use std::collections::BTreeMap;

/// 请求/响应参数集
///
/// 微信支付V2接口的报文是一层扁平的键值对。签名使用字典序，
/// 因此内部直接用`BTreeMap`保存，遍历即为签名所需的顺序。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldBag {
    values: BTreeMap<String, String>,
}

impl FieldBag {
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置参数，数值类型按十进制文本写入
    pub fn set(&mut self, key: &str, value: impl ToString) -> &mut Self {
        self.values.insert(key.to_string(), value.to_string());
        self
    }

    /// 读取参数，不存在时返回`None`
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// 参数是否已填入（必填参数校验用）
    pub fn is_set(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.values.remove(key)
    }

    /// 按键的字典序升序遍历
    pub fn iter(&self) -> btree_map::Iter<'_, String, String> {
        self.values.iter()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn into_inner(self) -> BTreeMap<String, String> {
        self.values
    }
}

impl<K: ToString, V: ToString> FromIterator<(K, V)> for FieldBag {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut bag = FieldBag::new();
        for (k, v) in iter {
            bag.set(&k.to_string(), v);
        }
        bag
    }
}
