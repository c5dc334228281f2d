//! Multilingual keyword corpora for the classifier's lexical dimensions,
//! covering nine scripts — English, Chinese, Japanese, Russian, German,
//! Spanish, Portuguese, Korean, Arabic. Matching is case-insensitive
//! substring containment over the lowercased combined text; list order is
//! irrelevant.

pub static CODE_KEYWORDS: &[&str] = &[
    // English
    "function", "class", "import", "def", "select", "async", "await",
    "const", "let", "var", "return", "```",
    // Chinese
    "函数", "异步", "导入", "类",
    // Japanese
    "関数", "非同期", "クラス",
    // Russian
    "функция", "класс", "асинхрон",
    // German
    "funktion", "klasse", "rückgabe",
    // Spanish
    "función", "clase", "devuelve",
    // Portuguese
    "função", "classe", "retorna",
    // Korean
    "함수", "클래스", "비동기",
    // Arabic
    "دالة", "صنف",
];

pub static REASONING_KEYWORDS: &[&str] = &[
    // English
    "prove", "theorem", "derive", "step by step", "chain of thought",
    "formally", "mathematical", "proof", "logically",
    // Chinese
    "证明", "定理", "逐步推导", "逻辑上",
    // Japanese
    "証明", "定理", "段階的に", "論理的に",
    // Russian
    "доказать", "теорема", "пошагово", "логически",
    // German
    "beweisen", "theorem", "schrittweise", "logisch",
    // Spanish
    "demostrar", "teorema", "paso a paso", "lógicamente",
    // Portuguese
    "demonstrar", "teorema", "passo a passo", "logicamente",
    // Korean
    "증명", "정리", "단계별로", "논리적으로",
    // Arabic
    "أثبت", "نظرية", "خطوة بخطوة", "منطقيا",
];

pub static SIMPLE_KEYWORDS: &[&str] = &[
    // English
    "what is", "define", "translate", "hello", "yes or no",
    "capital of", "how old", "who is", "when was",
    // Chinese
    "是什么", "你好", "首都",
    // Japanese
    "とは", "こんにちは", "首都",
    // Russian
    "что такое", "привет", "столица",
    // German
    "was ist", "hallo", "hauptstadt",
    // Spanish
    "qué es", "hola", "capital de",
    // Portuguese
    "o que é", "olá", "capital de",
    // Korean
    "무엇인가요", "안녕하세요", "수도",
    // Arabic
    "ما هو", "مرحبا", "عاصمة",
];

pub static TECHNICAL_KEYWORDS: &[&str] = &[
    // English
    "algorithm", "optimize", "architecture", "distributed", "kubernetes",
    "microservice", "database", "infrastructure",
    // Chinese
    "算法", "优化", "架构", "分布式", "数据库",
    // Japanese
    "アルゴリズム", "最適化", "アーキテクチャ", "分散", "データベース",
    // Russian
    "алгоритм", "оптимизация", "архитектура", "распределённ", "база данных",
    // German
    "algorithmus", "architektur", "datenbank", "infrastruktur",
    // Spanish
    "algoritmo", "arquitectura", "base de datos", "infraestructura",
    // Portuguese
    "algoritmo", "arquitetura", "banco de dados", "infraestrutura",
    // Korean
    "알고리즘", "아키텍처", "데이터베이스", "인프라",
    // Arabic
    "خوارزمية", "بنية", "قاعدة بيانات",
];

pub static CREATIVE_KEYWORDS: &[&str] = &[
    // English
    "story", "poem", "compose", "brainstorm", "creative", "imagine", "write a",
    // Chinese
    "故事", "诗歌", "创意", "想象",
    // Japanese
    "物語", "詩", "創造的", "想像",
    // Russian
    "рассказ", "стихотворение", "творческ", "представь",
    // German
    "geschichte", "gedicht", "kreativ", "stell dir vor",
    // Spanish
    "historia", "poema", "creativo", "imagina",
    // Portuguese
    "história", "poema", "criativo", "imagine",
    // Korean
    "이야기", "시", "창의적", "상상해",
    // Arabic
    "قصة", "قصيدة", "إبداعي", "تخيل",
];

pub static IMPERATIVE_KEYWORDS: &[&str] = &[
    // English
    "build", "create", "implement", "design", "develop", "construct",
    "generate", "deploy", "configure", "set up",
    // Chinese
    "构建", "创建", "实现", "部署", "配置",
    // Japanese
    "構築", "作成", "実装", "デプロイ", "設定",
    // Russian
    "построй", "создай", "реализуй", "разверни", "настрой",
    // German
    "erstelle", "implementiere", "entwickle", "konfiguriere",
    // Spanish
    "construye", "crea", "implementa", "despliega", "configura",
    // Portuguese
    "construa", "crie", "implemente", "implante", "configure",
    // Korean
    "구축", "생성", "구현", "배포", "설정",
    // Arabic
    "ابنِ", "أنشئ", "نفذ", "انشر", "اضبط",
];

pub static CONSTRAINT_KEYWORDS: &[&str] = &[
    // English
    "under", "at most", "at least", "within", "no more than",
    "maximum", "minimum", "limit", "budget",
    // Chinese
    "不超过", "至少", "最多", "限制", "预算",
    // Japanese
    "以下で", "少なくとも", "最大", "制限", "予算",
    // Russian
    "не более", "как минимум", "максимум", "лимит", "бюджет",
    // German
    "höchstens", "mindestens", "maximum", "limit", "budget",
    // Spanish
    "como máximo", "al menos", "máximo", "límite", "presupuesto",
    // Portuguese
    "no máximo", "pelo menos", "máximo", "limite", "orçamento",
    // Korean
    "최대", "최소", "제한", "예산",
    // Arabic
    "بحد أقصى", "على الأقل", "حد", "ميزانية",
];

pub static OUTPUT_FORMAT_KEYWORDS: &[&str] = &[
    // English
    "json", "yaml", "xml", "table", "csv", "markdown", "schema", "format as", "structured",
    // Chinese
    "表格", "格式为", "结构化",
    // Japanese
    "表形式", "フォーマットで", "構造化",
    // Russian
    "таблица", "формате", "структурирован",
    // German
    "tabelle", "formatiert als", "strukturiert",
    // Spanish
    "tabla", "formato de", "estructurado",
    // Portuguese
    "tabela", "formato de", "estruturado",
    // Korean
    "표", "형식으로", "구조화된",
    // Arabic
    "جدول", "بصيغة", "منظم",
];

pub static REFERENCE_KEYWORDS: &[&str] = &[
    // English
    "above", "below", "previous", "following", "the docs", "the api",
    "the code", "earlier", "attached",
    // Chinese
    "上面", "下面", "之前", "附件",
    // Japanese
    "上記", "以下", "前述", "添付",
    // Russian
    "выше", "ниже", "предыдущ", "приложен",
    // German
    "oben", "unten", "vorherig", "angehängt",
    // Spanish
    "arriba", "abajo", "anterior", "adjunto",
    // Portuguese
    "acima", "abaixo", "anterior", "anexo",
    // Korean
    "위에서", "아래에서", "이전", "첨부",
    // Arabic
    "أعلاه", "أدناه", "السابق", "المرفق",
];

pub static NEGATION_KEYWORDS: &[&str] = &[
    // English
    "don't", "do not", "avoid", "never", "without", "except", "exclude", "no longer",
    // Chinese
    "不要", "避免", "从不", "排除",
    // Japanese
    "しないで", "避ける", "決して", "除外",
    // Russian
    "не надо", "избегай", "никогда", "исключи",
    // German
    "nicht", "vermeide", "niemals", "ausschließen",
    // Spanish
    "no hagas", "evita", "nunca", "excluye",
    // Portuguese
    "não faça", "evite", "nunca", "exclua",
    // Korean
    "하지 마", "피하다", "절대", "제외",
    // Arabic
    "لا تفعل", "تجنب", "أبدا", "استبعد",
];

pub static DOMAIN_KEYWORDS: &[&str] = &[
    // English
    "quantum", "fpga", "vlsi", "risc-v", "asic", "photonics", "genomics",
    "proteomics", "topological", "homomorphic", "zero-knowledge", "lattice-based",
    // Chinese
    "量子", "基因组学", "同态", "零知识",
    // Japanese
    "量子", "ゲノミクス", "準同型", "ゼロ知識",
    // Russian
    "квантов", "геномика", "гомоморфн", "нулевым разглашением",
    // German
    "quanten", "genomik", "homomorph", "zero-knowledge",
    // Spanish
    "cuántico", "genómica", "homomórfico", "conocimiento cero",
    // Portuguese
    "quântico", "genômica", "homomórfico", "conhecimento zero",
    // Korean
    "양자", "유전체학", "준동형", "영지식",
    // Arabic
    "كمي", "الجينوم", "متماثل الشكل", "المعرفة الصفرية",
];

pub static AGENTIC_KEYWORDS: &[&str] = &[
    // English
    "read file", "read the file", "look at", "check the", "open the",
    "edit", "modify", "update the", "change the", "write to", "create file",
    "execute", "deploy", "install", "npm", "pip", "compile",
    "after that", "and also", "once done", "step 1", "step 2",
    "fix", "debug", "until it works", "keep trying", "iterate",
    "make sure", "verify", "confirm",
    // Chinese
    "读取文件", "修改", "执行", "安装", "调试", "确认",
    // Japanese
    "ファイルを読む", "修正", "実行する", "インストール", "デバッグ", "確認する",
    // Russian
    "прочитай файл", "измени", "выполни", "установи", "отладь", "подтверди",
    // German
    "lies die datei", "ändere", "führe aus", "installiere", "debugge", "bestätige",
    // Spanish
    "lee el archivo", "modifica", "ejecuta", "instala", "depura", "confirma",
    // Portuguese
    "leia o arquivo", "modifique", "execute", "instale", "depure", "confirme",
    // Korean
    "파일을 읽어", "수정해", "실행해", "설치해", "디버그", "확인해",
    // Arabic
    "اقرأ الملف", "عدّل", "نفّذ", "ثبّت", "صحّح", "تأكد",
];
